//! Onion composition of middleware.
//!
//! The chain is built right to left: the endpoint is wrapped by the last
//! middleware added, which is wrapped by the one before it, and so on. For
//! middleware `[m1, m2, m3]` the observed order is
//!
//! ```text
//! m1 before → m2 before → m3 before → endpoint → m3 after → m2 after → m1 after
//! ```

use crate::middleware::{BoxedMiddleware, Endpoint, Middleware, Next};
use kiln_core::{HandlerResult, Registry, Request, Response};
use std::sync::Arc;

/// Ordered middleware stack.
///
/// Every method takes `&self`. Requests that are already running keep the
/// snapshot they started with, so middleware can be added while serving.
///
/// # Example
///
/// ```
/// use kiln_core::{HandlerResult, Request, Response};
/// use kiln_middleware::{FnEndpoint, FnMiddleware, MiddlewareChain};
///
/// # tokio_test::block_on(async {
/// let chain = MiddlewareChain::new();
/// chain.add(FnMiddleware::new("trace", |request, next| {
///     Box::pin(async move { Ok(next.run(request).await?.with_header("X-Trace", "1")) })
/// }));
///
/// let endpoint = FnEndpoint::new(|_: &Request| Ok(Response::text("ok")));
/// let mut request = Request::get("/");
/// let response = chain.process(&mut request, &endpoint).await.unwrap();
/// assert_eq!(response.header("x-trace"), Some("1"));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MiddlewareChain {
    stack: Registry<BoxedMiddleware>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware; it runs inside everything added before it.
    pub fn add<M: Middleware>(&self, middleware: M) {
        self.add_arc(Arc::new(middleware));
    }

    /// Appends a shared middleware.
    pub fn add_arc(&self, middleware: BoxedMiddleware) {
        tracing::debug!(middleware = middleware.name(), "adding middleware");
        self.stack.push(middleware);
    }

    /// Inserts a middleware at `index`, clamped to the chain length.
    pub fn insert<M: Middleware>(&self, index: usize, middleware: M) {
        tracing::debug!(middleware = middleware.name(), index, "inserting middleware");
        self.stack.insert(index, Arc::new(middleware));
    }

    /// Removes every middleware named `name`. Returns true if any was removed.
    pub fn remove(&self, name: &str) -> bool {
        self.stack.remove_where(|m| m.name() == name) > 0
    }

    /// Returns the middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.stack.snapshot().iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middleware.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs `request` through every middleware and then `endpoint`.
    pub async fn process(
        &self,
        request: &mut Request,
        endpoint: &dyn Endpoint,
    ) -> HandlerResult<Response> {
        let stack = self.stack.snapshot();
        build_chain(&stack, endpoint).run(request).await
    }
}

fn build_chain<'a>(stack: &'a [BoxedMiddleware], endpoint: &'a dyn Endpoint) -> Next<'a> {
    stack
        .iter()
        .rev()
        .fold(Next::endpoint(endpoint), |next, middleware| {
            Next::wrap(middleware.as_ref(), next)
        })
}
