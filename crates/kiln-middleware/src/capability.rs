//! Capability middleware and the manager that runs them.
//!
//! Besides onion [`Middleware`](crate::Middleware), simpler interceptors can
//! declare any subset of three capabilities:
//!
//! - [`RequestMiddleware`] runs before the endpoint, in registration order,
//!   and may only modify the request.
//! - [`ResponseMiddleware`] runs after the endpoint, in *reverse*
//!   registration order, and may replace the response.
//! - [`ExceptionMiddleware`] is consulted in registration order when the
//!   pipeline fails; the first one returning a response wins.
//!
//! A type implementing several capabilities announces them once through
//! [`Capabilities`] when it is registered.

use crate::chain::MiddlewareChain;
use crate::middleware::{Endpoint, Middleware};
use futures_util::FutureExt;
use kiln_core::{BoxFuture, HandlerError, HandlerResult, Registry, Request, Response};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Preprocesses requests.
pub trait RequestMiddleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Inspects or modifies the request in place.
    fn process_request<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<()>>;
}

/// Postprocesses responses.
pub trait ResponseMiddleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Inspects or replaces the response.
    fn process_response<'a>(
        &'a self,
        request: &'a Request,
        response: Response,
    ) -> BoxFuture<'a, HandlerResult<Response>>;
}

/// Turns pipeline errors into responses.
pub trait ExceptionMiddleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns a response for `error`, or `None` to let the next handler try.
    ///
    /// Failing here is logged and treated like `None`.
    fn process_exception<'a>(
        &'a self,
        request: &'a Request,
        error: &'a HandlerError,
    ) -> BoxFuture<'a, HandlerResult<Option<Response>>>;
}

/// Declares which capabilities a middleware provides.
///
/// Every method defaults to `None`; implement the ones that apply by
/// returning `Some(self)`.
///
/// ```
/// use kiln_core::{BoxFuture, HandlerResult, Request, Response};
/// use kiln_middleware::{Capabilities, RequestMiddleware, ResponseMiddleware};
/// use std::sync::Arc;
///
/// struct Audit;
///
/// impl RequestMiddleware for Audit {
///     fn process_request<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, HandlerResult<()>> {
///         request.attributes().insert("audited", true);
///         Box::pin(async { Ok(()) })
///     }
/// }
///
/// impl ResponseMiddleware for Audit {
///     fn process_response<'a>(
///         &'a self,
///         _request: &'a Request,
///         response: Response,
///     ) -> BoxFuture<'a, HandlerResult<Response>> {
///         Box::pin(async move { Ok(response.with_header("X-Audited", "yes")) })
///     }
/// }
///
/// impl Capabilities for Audit {
///     fn request(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
///         Some(self)
///     }
///
///     fn response(self: Arc<Self>) -> Option<Arc<dyn ResponseMiddleware>> {
///         Some(self)
///     }
/// }
/// ```
pub trait Capabilities: Send + Sync + 'static {
    /// The request capability.
    fn request(self: Arc<Self>) -> Option<Arc<dyn RequestMiddleware>> {
        None
    }

    /// The response capability.
    fn response(self: Arc<Self>) -> Option<Arc<dyn ResponseMiddleware>> {
        None
    }

    /// The exception capability.
    fn exception(self: Arc<Self>) -> Option<Arc<dyn ExceptionMiddleware>> {
        None
    }
}

/// Which capabilities a registration contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registered {
    /// A request capability was registered.
    pub request: bool,
    /// A response capability was registered.
    pub response: bool,
    /// An exception capability was registered.
    pub exception: bool,
}

/// Owns the onion chain and the capability lists.
///
/// Registration works through `&self` and may happen while requests are in
/// flight; each pass iterates the snapshot it started with.
#[derive(Default)]
pub struct MiddlewareManager {
    chain: MiddlewareChain,
    request: Registry<Arc<dyn RequestMiddleware>>,
    response: Registry<Arc<dyn ResponseMiddleware>>,
    exception: Registry<Arc<dyn ExceptionMiddleware>>,
}

impl MiddlewareManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the onion chain.
    pub fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// Appends an onion middleware.
    pub fn add<M: Middleware>(&self, middleware: M) {
        self.chain.add(middleware);
    }

    /// Registers a request capability.
    pub fn add_request<M: RequestMiddleware>(&self, middleware: M) {
        self.add_request_arc(Arc::new(middleware));
    }

    /// Registers a shared request capability.
    pub fn add_request_arc(&self, middleware: Arc<dyn RequestMiddleware>) {
        tracing::debug!(middleware = middleware.name(), "adding request middleware");
        self.request.push(middleware);
    }

    /// Registers a response capability.
    pub fn add_response<M: ResponseMiddleware>(&self, middleware: M) {
        self.add_response_arc(Arc::new(middleware));
    }

    /// Registers a shared response capability.
    pub fn add_response_arc(&self, middleware: Arc<dyn ResponseMiddleware>) {
        tracing::debug!(middleware = middleware.name(), "adding response middleware");
        self.response.push(middleware);
    }

    /// Registers an exception capability.
    pub fn add_exception<M: ExceptionMiddleware>(&self, middleware: M) {
        self.add_exception_arc(Arc::new(middleware));
    }

    /// Registers a shared exception capability.
    pub fn add_exception_arc(&self, middleware: Arc<dyn ExceptionMiddleware>) {
        tracing::debug!(middleware = middleware.name(), "adding exception middleware");
        self.exception.push(middleware);
    }

    /// Registers every capability `middleware` declares.
    pub fn add_capabilities<M: Capabilities>(&self, middleware: M) -> Registered {
        let middleware = Arc::new(middleware);
        let mut registered = Registered::default();

        if let Some(request) = Arc::clone(&middleware).request() {
            self.add_request_arc(request);
            registered.request = true;
        }
        if let Some(response) = Arc::clone(&middleware).response() {
            self.add_response_arc(response);
            registered.response = true;
        }
        if let Some(exception) = middleware.exception() {
            self.add_exception_arc(exception);
            registered.exception = true;
        }

        registered
    }

    /// Number of registered request capabilities.
    pub fn request_count(&self) -> usize {
        self.request.len()
    }

    /// Number of registered response capabilities.
    pub fn response_count(&self) -> usize {
        self.response.len()
    }

    /// Number of registered exception capabilities.
    pub fn exception_count(&self) -> usize {
        self.exception.len()
    }

    /// Runs the onion chain around `endpoint`.
    pub async fn process(
        &self,
        request: &mut Request,
        endpoint: &dyn Endpoint,
    ) -> HandlerResult<Response> {
        self.chain.process(request, endpoint).await
    }

    /// Applies every request capability in registration order.
    pub async fn process_request(&self, request: &mut Request) -> HandlerResult<()> {
        for middleware in self.request.snapshot().iter() {
            middleware.process_request(request).await?;
        }
        Ok(())
    }

    /// Applies every response capability in reverse registration order.
    pub async fn process_response(
        &self,
        request: &Request,
        mut response: Response,
    ) -> HandlerResult<Response> {
        for middleware in self.response.snapshot().iter().rev() {
            response = middleware.process_response(request, response).await?;
        }
        Ok(response)
    }

    /// Offers `error` to each exception capability in registration order.
    ///
    /// Returns the first response produced. A capability that fails or
    /// panics is logged and skipped. If every capability declines, the original error
    /// is returned unchanged.
    pub async fn process_exception(
        &self,
        request: &Request,
        error: HandlerError,
    ) -> HandlerResult<Response> {
        for middleware in self.exception.snapshot().iter() {
            let outcome = AssertUnwindSafe(async {
                middleware.process_exception(request, &error).await
            })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic.as_ref())));

            match outcome {
                Ok(Some(response)) => return Ok(response),
                Ok(None) => {}
                Err(failure) => {
                    tracing::warn!(
                        middleware = middleware.name(),
                        error = %failure,
                        original_error = %error,
                        "exception middleware failed; trying next"
                    );
                }
            }
        }
        Err(error)
    }
}

impl fmt::Debug for MiddlewareManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareManager")
            .field("chain", &self.chain.names())
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .field("exception", &self.exception.len())
            .finish()
    }
}
