//! Onion middleware trait and continuation.
//!
//! A [`Middleware`] wraps everything registered after it. It receives the
//! request and a [`Next`] continuation and may:
//!
//! - call `next` and return its result unchanged,
//! - call `next`, then inspect or modify the response,
//! - return its own response without calling `next` (short-circuit),
//! - fail with a [`HandlerError`](kiln_core::HandlerError), which the kernel routes to exception
//!   handling.
//!
//! The request is passed by mutable reference, so changes made by an outer
//! layer are what every inner layer and the endpoint observe.
//!
//! # Example
//!
//! ```
//! use kiln_core::{BoxFuture, HandlerResult, Request, Response};
//! use kiln_middleware::{Middleware, Next};
//!
//! struct Trace;
//!
//! impl Middleware for Trace {
//!     fn name(&self) -> &'static str {
//!         "trace"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         request: &'a mut Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, HandlerResult<Response>> {
//!         Box::pin(async move {
//!             let response = next.run(request).await?;
//!             Ok(response.with_header("X-Trace", "1"))
//!         })
//!     }
//! }
//! ```

use kiln_core::{BoxFuture, BoxedHandler, HandlerResult, Request, Response};
use std::fmt;
use std::sync::Arc;

/// A shared middleware instance.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A layer of the onion.
pub trait Middleware: Send + Sync + 'static {
    /// Name used for logging and for removal from a chain.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by delegating to `next`.
    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>>;
}

/// The innermost stage of a chain, usually route dispatch.
pub trait Endpoint: Send + Sync {
    /// Produces the response for a request that passed every layer.
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<Response>>;
}

impl Endpoint for BoxedHandler {
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<Response>> {
        kiln_core::Handler::call(self.as_ref(), request.clone())
    }
}

/// The remainder of the chain, handed to each middleware.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Endpoint(&'a dyn Endpoint),
}

impl<'a> Next<'a> {
    /// Creates a continuation that goes straight to `endpoint`.
    pub fn endpoint(endpoint: &'a dyn Endpoint) -> Self {
        Self {
            inner: NextInner::Endpoint(endpoint),
        }
    }

    /// Wraps `next` with `middleware`.
    pub(crate) fn wrap(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Runs the rest of the chain.
    pub fn run(self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<Response>> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(request, *next),
            NextInner::Endpoint(endpoint) => endpoint.call(request),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => f
                .debug_struct("Next")
                .field("middleware", &middleware.name())
                .finish(),
            NextInner::Endpoint(_) => f.debug_struct("Next").field("endpoint", &true).finish(),
        }
    }
}

type MiddlewareFn = dyn for<'a> Fn(&'a mut Request, Next<'a>) -> BoxFuture<'a, HandlerResult<Response>>
    + Send
    + Sync;

/// Middleware backed by a closure.
///
/// ```
/// use kiln_middleware::FnMiddleware;
///
/// let stamp = FnMiddleware::new("stamp", |request, next| {
///     Box::pin(async move {
///         request.attributes().insert("stamped", true);
///         next.run(request).await
///     })
/// });
/// # let _ = stamp;
/// ```
pub struct FnMiddleware {
    name: &'static str,
    func: Box<MiddlewareFn>,
}

impl FnMiddleware {
    /// Creates a named middleware from a closure.
    pub fn new<F>(name: &'static str, func: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, Next<'a>) -> BoxFuture<'a, HandlerResult<Response>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            func: Box::new(func),
        }
    }
}

impl Middleware for FnMiddleware {
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        (self.func)(request, next)
    }
}

impl fmt::Debug for FnMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

/// Endpoint backed by a synchronous closure.
pub struct FnEndpoint<F>(F);

impl<F> FnEndpoint<F>
where
    F: Fn(&Request) -> HandlerResult<Response> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self(func)
    }
}

impl<F> Endpoint for FnEndpoint<F>
where
    F: Fn(&Request) -> HandlerResult<Response> + Send + Sync,
{
    fn call<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<Response>> {
        let result = (self.0)(request);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::HandlerError;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            request: &'a mut Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, HandlerResult<Response>> {
            Box::pin(async move {
                request.headers_mut().append("x-seen", self.0);
                let response = next.run(request).await?;
                Ok(response.append_header("x-tag", self.0))
            })
        }
    }

    #[tokio::test]
    async fn test_next_runs_endpoint() {
        let endpoint = FnEndpoint::new(|request: &Request| Ok(Response::text(request.path().to_string())));
        let mut request = Request::get("/ping");

        let response = Next::endpoint(&endpoint).run(&mut request).await.unwrap();
        assert_eq!(response.body().as_ref(), b"/ping");
    }

    #[tokio::test]
    async fn test_wrapped_middleware_sees_request_after() {
        let endpoint = FnEndpoint::new(|request: &Request| {
            Ok(Response::text(request.headers().get_all("x-seen").collect::<Vec<_>>().join(",")))
        });
        let tag = Tag("outer");
        let mut request = Request::get("/");

        let response = Next::wrap(&tag, Next::endpoint(&endpoint))
            .run(&mut request)
            .await
            .unwrap();

        assert_eq!(response.body().as_ref(), b"outer");
        assert_eq!(response.header("x-tag"), Some("outer"));
        assert_eq!(request.header("x-seen"), Some("outer"));
    }

    #[tokio::test]
    async fn test_fn_middleware_short_circuit() {
        let deny = FnMiddleware::new("deny", |_request, _next| {
            Box::pin(async { Ok(Response::forbidden("Forbidden")) })
        });
        let unreachable =
            FnEndpoint::new(|_request: &Request| Err(HandlerError::internal("unreachable")));
        let mut request = Request::get("/");

        let response = Next::wrap(&deny, Next::endpoint(&unreachable))
            .run(&mut request)
            .await
            .unwrap();

        assert_eq!(response.status_code(), 403);
        assert_eq!(deny.name(), "deny");
    }

    #[tokio::test]
    async fn test_boxed_handler_endpoint() {
        let handler: BoxedHandler = Arc::new(|request: Request| async move {
            Ok::<_, HandlerError>(Response::text(request.path().to_string()))
        });
        let mut request = Request::get("/handler");

        let response = Next::endpoint(&handler).run(&mut request).await.unwrap();
        assert_eq!(response.body().as_ref(), b"/handler");
    }
}
