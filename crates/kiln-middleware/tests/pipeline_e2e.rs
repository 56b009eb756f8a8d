//! End-to-end middleware tests.
//!
//! These tests drive a [`MiddlewareManager`] the way the kernel does: onion
//! layers around an endpoint that applies request capabilities, a handler
//! and response capabilities, with exception capabilities on failure.

use kiln_core::{BoxFuture, ErrorKind, HandlerError, HandlerResult, Request, Response};
use kiln_middleware::{
    stages::{DefaultErrorHandler, ErrorHandlers, RequestIdMiddleware, TraceMiddleware, REQUEST_ID_HEADER},
    Endpoint, Middleware, MiddlewareChain, MiddlewareManager, Next, RequestMiddleware,
    ResponseMiddleware,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

type Trace = Arc<Mutex<Vec<String>>>;

struct Layer {
    name: String,
    trace: Trace,
}

impl Middleware for Layer {
    fn name(&self) -> &'static str {
        "layer"
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        Box::pin(async move {
            self.trace.lock().push(format!("{}_before", self.name));
            let response = next.run(request).await;
            self.trace.lock().push(format!("{}_after", self.name));
            response
        })
    }
}

struct Marker(&'static str);

impl RequestMiddleware for Marker {
    fn process_request<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<()>> {
        request.headers_mut().append("x-marker", self.0);
        Box::pin(async { Ok(()) })
    }
}

impl ResponseMiddleware for Marker {
    fn process_response<'a>(
        &'a self,
        _request: &'a Request,
        response: Response,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        Box::pin(async move { Ok(response.append_header("x-marker", self.0)) })
    }
}

/// The dispatch step the kernel wraps in the onion.
struct Dispatch<'m> {
    manager: &'m MiddlewareManager,
    fail_with: Option<ErrorKind>,
}

impl Endpoint for Dispatch<'_> {
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<Response>> {
        Box::pin(async move {
            self.manager.process_request(request).await?;
            if let Some(kind) = self.fail_with {
                return Err(HandlerError::new(kind, "dispatch failed"));
            }
            let seen = request.headers().get_all("x-marker").collect::<Vec<_>>().join(",");
            let response = Response::text(seen);
            self.manager.process_response(request, response).await
        })
    }
}

async fn run(manager: &MiddlewareManager, fail_with: Option<ErrorKind>) -> Response {
    let mut request = Request::get("/orders");
    let endpoint = Dispatch { manager, fail_with };
    match manager.process(&mut request, &endpoint).await {
        Ok(response) => response,
        Err(error) => manager
            .process_exception(&request, error)
            .await
            .unwrap_or_else(|error| DefaultErrorHandler::status_only(false).respond(&error)),
    }
}

#[tokio::test]
async fn test_capabilities_run_inside_onion() {
    let trace = Trace::default();
    let manager = MiddlewareManager::new();
    manager.add(Layer {
        name: "outer".into(),
        trace: Arc::clone(&trace),
    });
    manager.add_request(Marker("a"));
    manager.add_request(Marker("b"));
    manager.add_response(Marker("a"));
    manager.add_response(Marker("b"));

    let response = run(&manager, None).await;

    assert_eq!(response.body().as_ref(), b"a,b");
    assert_eq!(
        response.headers().get_all("x-marker").collect::<Vec<_>>(),
        vec!["b", "a"]
    );
    assert_eq!(*trace.lock(), vec!["outer_before", "outer_after"]);
}

#[tokio::test]
async fn test_error_reaches_exception_handlers() {
    let manager = MiddlewareManager::new();
    manager.add(TraceMiddleware::new());
    let handlers = ErrorHandlers::new();
    handlers.register(ErrorKind::Conflict, 0, |error, _request| {
        Ok(Response::new(409)?.with_body(error.message().to_string()))
    });
    manager.add_exception(handlers);

    let response = run(&manager, Some(ErrorKind::Conflict)).await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(response.body().as_ref(), b"dispatch failed");

    let response = run(&manager, Some(ErrorKind::Internal)).await;
    assert_eq!(response.status_code(), 500);
}

#[tokio::test]
async fn test_default_error_handler_as_middleware() {
    let manager = MiddlewareManager::new();
    manager.add_exception(DefaultErrorHandler::new(false));

    let response = run(&manager, Some(ErrorKind::Permission)).await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(response.body().as_ref(), br#"{"error":"Permission denied"}"#);
}

#[tokio::test]
async fn test_request_id_on_every_response() {
    let manager = MiddlewareManager::new();
    manager.add(RequestIdMiddleware::new());
    manager.add(TraceMiddleware::new());

    let first = run(&manager, None).await;
    let second = run(&manager, None).await;

    let first_id = first.header(REQUEST_ID_HEADER).unwrap();
    let second_id = second.header(REQUEST_ID_HEADER).unwrap();
    assert_ne!(first_id, second_id);
}

proptest! {
    #[test]
    fn prop_onion_order(depth in 0usize..8) {
        let trace = Trace::default();
        let chain = MiddlewareChain::new();
        for i in 0..depth {
            chain.add(Layer { name: format!("m{i}"), trace: Arc::clone(&trace) });
        }

        let endpoint_trace = Arc::clone(&trace);
        let endpoint = kiln_middleware::FnEndpoint::new(move |_: &Request| {
            endpoint_trace.lock().push("handler".to_string());
            Ok(Response::ok())
        });

        let mut request = Request::get("/");
        let result = tokio_test::block_on(chain.process(&mut request, &endpoint));
        prop_assert!(result.is_ok());

        let mut expected: Vec<String> = (0..depth).map(|i| format!("m{i}_before")).collect();
        expected.push("handler".to_string());
        expected.extend((0..depth).rev().map(|i| format!("m{i}_after")));
        prop_assert_eq!(trace.lock().clone(), expected);
    }
}
