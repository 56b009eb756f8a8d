//! The route table.
//!
//! A [`Router`] is an ordered list of [`Route`]s plus the middleware that
//! should wrap the whole application when the router is registered.
//! Matching tries routes in registration order; the first route whose
//! pattern and method set both accept the request wins.

use crate::pattern::PathPattern;
use crate::{RouteError, RouteMatch};
use http::Method;
use kiln_core::{BoxedHandler, Handler};
use kiln_middleware::{BoxedMiddleware, Middleware};
use std::fmt;
use std::sync::Arc;

/// Identifies a route within its router, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(usize);

impl RouteId {
    /// Returns the registration index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A pattern, method set and handler.
#[derive(Clone)]
pub struct Route {
    id: RouteId,
    pattern: PathPattern,
    methods: Vec<Method>,
    handler: BoxedHandler,
}

impl Route {
    /// Returns the route's id.
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Returns the parsed pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the accepted methods in registration order.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Returns the handler.
    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Returns true if `method` is in the method set.
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("pattern", &self.pattern.as_str())
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// An ordered route table.
///
/// # Example
///
/// ```
/// use kiln_core::{HandlerError, Method, Request, Response};
/// use kiln_router::Router;
///
/// let mut router = Router::new();
/// router
///     .get("/users/{id}", |request: Request| async move {
///         Ok::<_, HandlerError>(Response::text(request.path().to_string()))
///     })
///     .unwrap();
///
/// let matched = router.match_route(&Method::GET, "/users/42").unwrap();
/// assert_eq!(matched.params.get("id"), Some("42"));
/// assert!(router.match_route(&Method::POST, "/users/42").is_none());
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    middleware: Vec<BoxedMiddleware>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `pattern` and `methods`.
    ///
    /// Duplicate methods are ignored. An empty method set means `GET`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is not a valid route pattern.
    pub fn add_route<H, I>(&mut self, pattern: &str, handler: H, methods: I) -> Result<RouteId, RouteError>
    where
        H: Handler,
        I: IntoIterator<Item = Method>,
    {
        self.add_boxed_route(pattern, Arc::new(handler), methods)
    }

    /// Registers an already shared handler.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is not a valid route pattern.
    pub fn add_boxed_route<I>(
        &mut self,
        pattern: &str,
        handler: BoxedHandler,
        methods: I,
    ) -> Result<RouteId, RouteError>
    where
        I: IntoIterator<Item = Method>,
    {
        let pattern = PathPattern::parse(pattern)?;

        let mut method_set: Vec<Method> = Vec::new();
        for method in methods {
            if !method_set.contains(&method) {
                method_set.push(method);
            }
        }
        if method_set.is_empty() {
            method_set.push(Method::GET);
        }

        let id = RouteId(self.routes.len());
        tracing::debug!(pattern = %pattern, methods = ?method_set, "adding route");
        self.routes.push(Route {
            id,
            pattern,
            methods: method_set,
            handler,
        });
        Ok(id)
    }

    /// Registers a `GET` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is invalid.
    pub fn get<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<RouteId, RouteError> {
        self.add_route(pattern, handler, [Method::GET])
    }

    /// Registers a `POST` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is invalid.
    pub fn post<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<RouteId, RouteError> {
        self.add_route(pattern, handler, [Method::POST])
    }

    /// Registers a `PUT` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is invalid.
    pub fn put<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<RouteId, RouteError> {
        self.add_route(pattern, handler, [Method::PUT])
    }

    /// Registers a `PATCH` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is invalid.
    pub fn patch<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<RouteId, RouteError> {
        self.add_route(pattern, handler, [Method::PATCH])
    }

    /// Registers a `DELETE` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is invalid.
    pub fn delete<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<RouteId, RouteError> {
        self.add_route(pattern, handler, [Method::DELETE])
    }

    /// Adds middleware that the application installs when this router is
    /// registered.
    pub fn add_middleware<M: Middleware>(&mut self, middleware: M) {
        self.middleware.push(Arc::new(middleware));
    }

    /// Builder form of [`add_middleware`](Self::add_middleware).
    #[must_use]
    pub fn with_middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.add_middleware(middleware);
        self
    }

    /// Returns the router's middleware in registration order.
    pub fn middleware(&self) -> &[BoxedMiddleware] {
        &self.middleware
    }

    /// Returns the routes in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Finds the first route accepting `method` and `path`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.allows(method))
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no route is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{HandlerError, Request, Response};
    use kiln_middleware::FnMiddleware;

    fn named(name: &'static str) -> impl Handler {
        move |_request: Request| async move { Ok::<_, HandlerError>(Response::text(name)) }
    }

    async fn call(matched: &RouteMatch<'_>) -> String {
        let response = matched.route.handler().call(Request::get("/")).await.unwrap();
        String::from_utf8(response.body().to_vec()).unwrap()
    }

    #[test]
    fn test_router_new() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn test_empty_methods_default_to_get() {
        let mut router = Router::new();
        router.add_route("/users", named("list"), Vec::new()).unwrap();

        assert_eq!(router.routes()[0].methods(), &[Method::GET]);
        assert!(router.match_route(&Method::GET, "/users").is_some());
        assert!(router.match_route(&Method::POST, "/users").is_none());
    }

    #[test]
    fn test_duplicate_methods_collapse() {
        let mut router = Router::new();
        router
            .add_route("/users", named("users"), [Method::POST, Method::GET, Method::POST])
            .unwrap();

        assert_eq!(router.routes()[0].methods(), &[Method::POST, Method::GET]);
    }

    #[tokio::test]
    async fn test_first_registered_wins() {
        let mut router = Router::new();
        router.get("/users/{id}", named("by_id")).unwrap();
        router.get("/users/me", named("me")).unwrap();

        let matched = router.match_route(&Method::GET, "/users/me").unwrap();
        assert_eq!(call(&matched).await, "by_id");
        assert_eq!(matched.params.get("id"), Some("me"));
        assert_eq!(matched.route.id().index(), 0);
    }

    #[tokio::test]
    async fn test_method_filters_before_pattern() {
        let mut router = Router::new();
        router.post("/items", named("create")).unwrap();
        router.get("/items", named("list")).unwrap();

        let matched = router.match_route(&Method::GET, "/items").unwrap();
        assert_eq!(call(&matched).await, "list");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut router = Router::new();
        let err = router.get("/users/{id", named("broken")).unwrap_err();

        assert!(matches!(err, RouteError::InvalidSegment { .. }));
        assert!(router.is_empty());
    }

    #[test]
    fn test_shortcuts_register_single_method() {
        let mut router = Router::new();
        router.put("/a", named("put")).unwrap();
        router.patch("/a", named("patch")).unwrap();
        router.delete("/a", named("delete")).unwrap();

        let methods: Vec<_> = router.routes().iter().map(|r| r.methods()[0].clone()).collect();
        assert_eq!(methods, vec![Method::PUT, Method::PATCH, Method::DELETE]);
    }

    #[test]
    fn test_router_middleware() {
        let router = Router::new().with_middleware(FnMiddleware::new("scoped", |request, next| {
            next.run(request)
        }));

        assert_eq!(router.middleware().len(), 1);
        assert_eq!(router.middleware()[0].name(), "scoped");
    }
}
