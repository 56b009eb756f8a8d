//! The request pipeline orchestrator.
//!
//! [`Kernel::handle`] turns every request into a response:
//!
//! ```text
//! before_request hooks
//!   → onion middleware
//!       → request capabilities → route match → handler → response capabilities
//!   → after_request hooks
//!
//! on error: exception capabilities → error hooks → fallback responder
//! ```
//!
//! Unmatched requests get a JSON 404. Errors and panics from any stage are
//! converted into responses; `handle` never fails.

use crate::lifecycle::LifecycleManager;
use futures_util::FutureExt;
use kiln_core::{
    BoxFuture, BoxedHandler, Handler, HandlerError, HandlerResult, Params, Registry, Request,
    Response, StatusCode,
};
use kiln_middleware::stages::{json_response, DefaultErrorHandler};
use kiln_middleware::{Endpoint, MiddlewareManager};
use kiln_router::Router;
use serde_json::json;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Wires routers, middleware and lifecycle hooks into one request handler.
///
/// # Example
///
/// ```
/// use kiln_core::{HandlerError, Request, Response};
/// use kiln_kernel::{Kernel, LifecycleManager};
/// use kiln_middleware::MiddlewareManager;
/// use kiln_router::Router;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let kernel = Kernel::new(Arc::new(LifecycleManager::new()), Arc::new(MiddlewareManager::new()));
///
/// let mut router = Router::new();
/// router
///     .get("/health", |_request: Request| async { Ok::<_, HandlerError>(Response::text("ok")) })
///     .unwrap();
/// kernel.register_router(Arc::new(router));
///
/// assert_eq!(kernel.handle(Request::get("/health")).await.status_code(), 200);
/// assert_eq!(kernel.handle(Request::get("/missing")).await.status_code(), 404);
/// # });
/// ```
pub struct Kernel {
    lifecycle: Arc<LifecycleManager>,
    middleware: Arc<MiddlewareManager>,
    routers: Registry<Arc<Router>>,
    fallback: DefaultErrorHandler,
}

struct Failure {
    request: Request,
    error: HandlerError,
}

impl Kernel {
    /// Creates a kernel whose fallback answers with the error's status hint
    /// or 500.
    #[must_use]
    pub fn new(lifecycle: Arc<LifecycleManager>, middleware: Arc<MiddlewareManager>) -> Self {
        Self {
            lifecycle,
            middleware,
            routers: Registry::new(),
            fallback: DefaultErrorHandler::status_only(false),
        }
    }

    /// Includes diagnostics in fallback responses.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.fallback = self.fallback.with_debug(debug);
        self
    }

    /// Replaces the last-resort error responder.
    #[must_use]
    pub fn with_fallback(mut self, fallback: DefaultErrorHandler) -> Self {
        self.fallback = fallback;
        self
    }

    /// Returns the lifecycle manager.
    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    /// Returns the middleware manager.
    pub fn middleware(&self) -> &Arc<MiddlewareManager> {
        &self.middleware
    }

    /// Returns the last-resort error responder.
    pub fn fallback(&self) -> DefaultErrorHandler {
        self.fallback
    }

    /// Appends a router. Routers are tried in registration order.
    pub fn register_router(&self, router: Arc<Router>) {
        tracing::debug!(routes = router.len(), "registering router");
        self.routers.push(router);
    }

    /// Returns the registered routers.
    pub fn routers(&self) -> Arc<Vec<Arc<Router>>> {
        self.routers.snapshot()
    }

    /// Handles one request. Always produces a response.
    pub async fn handle(&self, request: Request) -> Response {
        let original = request.clone();
        let outcome = AssertUnwindSafe(self.run(request)).catch_unwind().await;

        let failure = match outcome {
            Ok(Ok(response)) => return response,
            Ok(Err(failure)) => failure,
            Err(panic) => Failure {
                request: original,
                error: HandlerError::from_panic(panic.as_ref()),
            },
        };

        let Failure { request, error } = failure;
        match AssertUnwindSafe(self.recover(&request, error)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let error = HandlerError::from_panic(panic.as_ref());
                tracing::error!(error = %error, "error handling panicked");
                self.fallback.respond(&error)
            }
        }
    }

    async fn run(&self, request: Request) -> Result<Response, Failure> {
        let before = request.clone();
        let mut request = match self.lifecycle.before_request(request).await {
            Ok(request) => request,
            Err(error) => {
                return Err(Failure {
                    request: before,
                    error,
                })
            }
        };

        let dispatcher = Dispatcher { kernel: self };
        let response = match self.middleware.process(&mut request, &dispatcher).await {
            Ok(response) => response,
            Err(error) => return Err(Failure { request, error }),
        };

        match self.lifecycle.after_request(&request, response).await {
            Ok(response) => Ok(response),
            Err(error) => Err(Failure { request, error }),
        }
    }

    async fn dispatch(&self, request: &mut Request) -> HandlerResult<Response> {
        self.middleware.process_request(request).await?;

        let response = match self.find_route(request) {
            Some((handler, params)) => {
                request.set_path_params(params);
                Handler::call(handler.as_ref(), request.clone()).await?
            }
            None => {
                tracing::debug!(method = %request.method(), path = %request.path(), "no route matched");
                not_found(request)
            }
        };

        self.middleware.process_response(request, response).await
    }

    fn find_route(&self, request: &Request) -> Option<(BoxedHandler, Params)> {
        self.routers.snapshot().iter().find_map(|router| {
            router
                .match_route(request.method(), request.path())
                .map(|matched| (Arc::clone(matched.route.handler()), matched.params))
        })
    }

    async fn recover(&self, request: &Request, error: HandlerError) -> Response {
        let error = match self.middleware.process_exception(request, error).await {
            Ok(response) => return response,
            Err(error) => Arc::new(error),
        };

        if let Some(response) = self.lifecycle.handle_error(Arc::clone(&error), request).await {
            return response;
        }

        tracing::error!(
            method = %request.method(),
            path = %request.path(),
            kind = %error.kind(),
            error = %error,
            "unhandled request error"
        );
        self.fallback.respond(&error)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("lifecycle", &self.lifecycle)
            .field("middleware", &self.middleware)
            .field("routers", &self.routers.len())
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// The endpoint at the centre of the onion.
struct Dispatcher<'k> {
    kernel: &'k Kernel,
}

impl Endpoint for Dispatcher<'_> {
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<Response>> {
        Box::pin(self.kernel.dispatch(request))
    }
}

fn not_found(request: &Request) -> Response {
    let message = format!("No route found for {} {}", request.method(), request.path());
    json_response(StatusCode::NOT_FOUND, &json!({ "error": message }))
}


#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{ErrorKind, Method};
    use kiln_middleware::{ExceptionMiddleware, FnMiddleware, ResponseMiddleware};
    use serde_json::Value;

    fn kernel() -> Kernel {
        Kernel::new(
            Arc::new(LifecycleManager::new()),
            Arc::new(MiddlewareManager::new()),
        )
    }

    fn body(response: &Response) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn router_with(pattern: &str, handler: impl kiln_core::Handler) -> Arc<Router> {
        let mut router = Router::new();
        router.get(pattern, handler).unwrap();
        Arc::new(router)
    }

    #[tokio::test]
    async fn test_route_params_reach_handler() {
        let kernel = kernel();
        kernel.register_router(router_with("/api/users/{id}", |request: Request| async move {
            let id = request.path_param("id").unwrap_or_default().to_string();
            Ok::<_, HandlerError>(json!({ "id": id }))
        }));

        let response = kernel.handle(Request::get("/api/users/42")).await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(body(&response), json!({ "id": "42" }));
    }

    #[tokio::test]
    async fn test_unmatched_route_is_json_404() {
        let kernel = kernel();

        let response = kernel.handle(Request::get("/missing")).await;

        assert_eq!(response.status_code(), 404);
        assert_eq!(body(&response), json!({ "error": "No route found for GET /missing" }));
    }

    #[tokio::test]
    async fn test_routers_tried_in_order() {
        let kernel = kernel();
        kernel.register_router(router_with("/items/{id}", |_request: Request| async {
            Ok::<_, HandlerError>("first")
        }));
        kernel.register_router(router_with("/items/special", |_request: Request| async {
            Ok::<_, HandlerError>("second")
        }));
        kernel.register_router(router_with("/other", |_request: Request| async {
            Ok::<_, HandlerError>("third")
        }));

        let response = kernel.handle(Request::get("/items/special")).await;
        assert_eq!(response.body().as_ref(), b"first");

        let response = kernel.handle(Request::get("/other")).await;
        assert_eq!(response.body().as_ref(), b"third");
        assert_eq!(kernel.routers().len(), 3);
    }

    #[tokio::test]
    async fn test_handler_error_uses_status_hint() {
        let kernel = kernel();
        kernel.register_router(router_with("/custom", |_request: Request| async {
            Err::<Response, _>(
                HandlerError::new(ErrorKind::Internal, "custom").with_status(StatusCode::BAD_REQUEST),
            )
        }));

        let response = kernel.handle(Request::get("/custom")).await;

        assert_eq!(response.status_code(), 400);
        assert_eq!(body(&response)["error"], "custom");
    }

    #[tokio::test]
    async fn test_bare_kernel_answers_500_for_unhinted_errors() {
        let kernel = kernel();
        kernel.register_router(router_with("/invalid", |_request: Request| async {
            Err::<Response, _>(HandlerError::validation("bad value"))
        }));

        let response = kernel.handle(Request::get("/invalid")).await;
        assert_eq!(response.status_code(), 500);
    }

    #[tokio::test]
    async fn test_mapped_fallback() {
        let kernel = kernel().with_fallback(DefaultErrorHandler::new(false));
        kernel.register_router(router_with("/invalid", |_request: Request| async {
            Err::<Response, _>(HandlerError::validation("bad value"))
        }));

        let response = kernel.handle(Request::get("/invalid")).await;
        assert_eq!(response.status_code(), 400);
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let kernel = kernel().with_debug(true);
        kernel.register_router(router_with("/panic", |_request: Request| async {
            if true {
                panic!("handler exploded");
            }
            Ok::<_, HandlerError>("unreachable")
        }));

        let response = kernel.handle(Request::get("/panic")).await;

        assert_eq!(response.status_code(), 500);
        assert_eq!(body(&response)["error"], "panic: handler exploded");
    }

    #[tokio::test]
    async fn test_error_flow_order() {
        struct Declines;

        impl ExceptionMiddleware for Declines {
            fn process_exception<'a>(
                &'a self,
                _request: &'a Request,
                _error: &'a HandlerError,
            ) -> BoxFuture<'a, HandlerResult<Option<Response>>> {
                Box::pin(async { Ok(None) })
            }
        }

        let kernel = kernel();
        kernel.middleware().add_exception(Declines);
        kernel.lifecycle().on_error(|error: Arc<HandlerError>, _request| async move {
            Ok(Some(Response::text(format!("hook: {}", error.message()))))
        });
        kernel.register_router(router_with("/fail", |_request: Request| async {
            Err::<Response, _>(HandlerError::conflict("taken"))
        }));

        let response = kernel.handle(Request::get("/fail")).await;
        assert_eq!(response.body().as_ref(), b"hook: taken");
    }

    #[tokio::test]
    async fn test_not_found_goes_through_response_middleware() {
        struct Stamp;

        impl ResponseMiddleware for Stamp {
            fn process_response<'a>(
                &'a self,
                _request: &'a Request,
                response: Response,
            ) -> BoxFuture<'a, HandlerResult<Response>> {
                Box::pin(async move { Ok(response.with_header("x-stamp", "1")) })
            }
        }

        let kernel = kernel();
        kernel.middleware().add_response(Stamp);

        let response = kernel.handle(Request::new(Method::DELETE, "/nothing")).await;
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.header("x-stamp"), Some("1"));
    }

    #[tokio::test]
    async fn test_error_response_skips_after_request() {
        let kernel = kernel();
        kernel
            .lifecycle()
            .on_after_request(|_request, response: Response| async move {
                Ok(Some(response.with_header("x-after", "1")))
            });
        kernel.middleware().add(FnMiddleware::new("deny", |_request, _next| {
            Box::pin(async { Err(HandlerError::permission("nope")) })
        }));

        let response = kernel.handle(Request::get("/")).await;
        assert_eq!(response.status_code(), 500);
        assert!(response.header("x-after").is_none());
    }
}
