//! The application facade.
//!
//! [`App`] is the composition root. It owns the configuration, the service
//! container, the lifecycle manager, the middleware manager and the kernel,
//! and exposes registration methods for all of them. Every method takes
//! `&self`; clones share the same components.

use kiln_config::{ConfigError, ConfigLoader, KilnConfig};
use kiln_core::{Container, ErrorKind, Handler, HandlerError, HandlerResult, Method, Request, Response};
use kiln_kernel::{Kernel, LifecycleHook, LifecycleManager, LifecycleResult};
use kiln_middleware::stages::DefaultErrorHandler;
use kiln_middleware::{
    Capabilities, ExceptionMiddleware, Middleware, MiddlewareManager, Registered, RequestMiddleware,
    ResponseMiddleware,
};
use kiln_router::{RouteError, Router};
use kiln_telemetry::{LogConfig, TelemetryResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A Kiln application.
///
/// # Example
///
/// ```
/// use kiln::prelude::*;
///
/// # tokio_test::block_on(async {
/// let app = App::new(KilnConfig::default());
/// app.get("/api/users/{id}", |request: Request| async move {
///     let id = request.path_param("id").unwrap_or_default().to_string();
///     Ok::<_, HandlerError>(serde_json::json!({ "id": id }))
/// })
/// .unwrap();
///
/// let response = app.handle(Request::get("/api/users/42")).await;
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.body().as_ref(), br#"{"id":"42"}"#);
/// # });
/// ```
#[derive(Clone)]
pub struct App {
    config: Arc<KilnConfig>,
    container: Arc<Container>,
    kernel: Arc<Kernel>,
    error_handler: DefaultErrorHandler,
}

impl App {
    /// Creates an application from a loaded configuration.
    ///
    /// The default exception handler is built here from `config.debug` and
    /// used as the kernel's last-resort responder.
    pub fn new(config: KilnConfig) -> Self {
        let error_handler = DefaultErrorHandler::new(config.debug);
        let kernel = Kernel::new(
            Arc::new(LifecycleManager::new()),
            Arc::new(MiddlewareManager::new()),
        )
        .with_fallback(error_handler);

        tracing::debug!(env = %config.env, debug = config.debug, "application created");
        Self {
            config: Arc::new(config),
            container: Arc::new(Container::new()),
            kernel: Arc::new(kernel),
            error_handler,
        }
    }

    /// Loads and validates configuration, then creates the application.
    ///
    /// # Errors
    ///
    /// Returns the loader's [`ConfigError`].
    pub fn from_loader(loader: ConfigLoader) -> Result<Self, ConfigError> {
        Ok(Self::new(loader.load()?))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    /// Returns the service container.
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Returns the lifecycle manager.
    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        self.kernel.lifecycle()
    }

    /// Returns the middleware manager.
    pub fn middleware_manager(&self) -> &Arc<MiddlewareManager> {
        self.kernel.middleware()
    }

    /// Returns the kernel.
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Returns the default exception handler.
    pub fn error_handler(&self) -> DefaultErrorHandler {
        self.error_handler
    }

    /// Installs the global `tracing` subscriber configured from
    /// `log_level`, `env` and `debug`.
    ///
    /// # Errors
    ///
    /// Fails if the level is not a valid filter or a subscriber is already
    /// installed.
    pub fn init_logging(&self) -> TelemetryResult<()> {
        kiln_telemetry::init_logging(&LogConfig::from_config(&self.config))
    }

    // Routes

    /// Registers `handler` for `pattern` and `methods`. An empty method set
    /// means `GET`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is malformed.
    pub fn route<H, I>(&self, pattern: &str, methods: I, handler: H) -> Result<&Self, RouteError>
    where
        H: Handler,
        I: IntoIterator<Item = Method>,
    {
        let mut router = Router::new();
        router.add_route(pattern, handler, methods)?;
        self.kernel.register_router(Arc::new(router));
        Ok(self)
    }

    /// Registers a `GET` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is malformed.
    pub fn get<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, RouteError> {
        self.route(pattern, [Method::GET], handler)
    }

    /// Registers a `POST` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is malformed.
    pub fn post<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, RouteError> {
        self.route(pattern, [Method::POST], handler)
    }

    /// Registers a `PUT` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is malformed.
    pub fn put<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, RouteError> {
        self.route(pattern, [Method::PUT], handler)
    }

    /// Registers a `PATCH` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is malformed.
    pub fn patch<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, RouteError> {
        self.route(pattern, [Method::PATCH], handler)
    }

    /// Registers a `DELETE` route.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if `pattern` is malformed.
    pub fn delete<H: Handler>(&self, pattern: &str, handler: H) -> Result<&Self, RouteError> {
        self.route(pattern, [Method::DELETE], handler)
    }

    /// Registers a prebuilt router after every route added so far.
    ///
    /// The router's own middleware joins the application's onion chain.
    pub fn register_router(&self, router: Router) -> &Self {
        let middleware = self.kernel.middleware();
        for layer in router.middleware() {
            middleware.chain().add_arc(Arc::clone(layer));
        }
        self.kernel.register_router(Arc::new(router));
        self
    }

    /// Lists `(methods, pattern)` for every route, in matching order.
    pub fn routes(&self) -> Vec<(Vec<Method>, String)> {
        let routers = self.kernel.routers();
        routers
            .iter()
            .flat_map(|router| router.routes())
            .map(|route| (route.methods().to_vec(), route.pattern().as_str().to_string()))
            .collect()
    }

    // Middleware

    /// Appends an onion middleware.
    pub fn middleware<M: Middleware>(&self, middleware: M) -> &Self {
        self.kernel.middleware().add(middleware);
        self
    }

    /// Appends a request preprocessor.
    pub fn request_middleware<M: RequestMiddleware>(&self, middleware: M) -> &Self {
        self.kernel.middleware().add_request(middleware);
        self
    }

    /// Appends a response postprocessor. Postprocessors run in reverse
    /// registration order.
    pub fn response_middleware<M: ResponseMiddleware>(&self, middleware: M) -> &Self {
        self.kernel.middleware().add_response(middleware);
        self
    }

    /// Appends an exception handler.
    pub fn exception_middleware<M: ExceptionMiddleware>(&self, middleware: M) -> &Self {
        self.kernel.middleware().add_exception(middleware);
        self
    }

    /// Registers every capability `middleware` declares.
    pub fn capability_middleware<M: Capabilities>(&self, middleware: M) -> Registered {
        self.kernel.middleware().add_capabilities(middleware)
    }

    // Hooks

    /// Registers an error hook for errors of `kind`.
    ///
    /// Error hooks run after exception middleware has declined. The first
    /// hook returning a response wins; a failing hook is skipped.
    pub fn on_error<F>(&self, kind: ErrorKind, handler: F) -> &Self
    where
        F: Fn(&HandlerError, &Request) -> HandlerResult<Response> + Send + Sync + 'static,
    {
        self.lifecycle().on(
            filtered_error_hook(move |error| error.kind() == kind, handler)
                .named(format!("on_error({})", kind.as_str())),
        );
        self
    }

    /// Registers an error hook for errors accepted by `predicate`.
    pub fn on_error_where<P, F>(&self, predicate: P, handler: F) -> &Self
    where
        P: Fn(&HandlerError) -> bool + Send + Sync + 'static,
        F: Fn(&HandlerError, &Request) -> HandlerResult<Response> + Send + Sync + 'static,
    {
        self.lifecycle().on(filtered_error_hook(predicate, handler));
        self
    }

    /// Registers a startup hook. It receives the service container so it
    /// can provide services before the first request.
    pub fn on_startup<F, Fut>(&self, hook: F) -> &Self
    where
        F: Fn(Arc<Container>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        let container = Arc::clone(&self.container);
        self.lifecycle().on_startup(move || hook(Arc::clone(&container)));
        self
    }

    /// Registers a shutdown hook. Shutdown hooks run in reverse order.
    pub fn on_shutdown<F, Fut>(&self, hook: F) -> &Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.lifecycle().on_shutdown(hook);
        self
    }

    /// Registers a before-request hook. Returning `None` keeps the request.
    pub fn before_request<F, Fut>(&self, hook: F) -> &Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Request>>> + Send + 'static,
    {
        self.lifecycle().on_before_request(hook);
        self
    }

    /// Registers an after-request hook. Returning `None` keeps the response.
    pub fn after_request<F, Fut>(&self, hook: F) -> &Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Response>>> + Send + 'static,
    {
        self.lifecycle().on_after_request(hook);
        self
    }

    // Running

    /// Runs the startup hooks. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first startup hook failure.
    pub async fn start(&self) -> LifecycleResult {
        tracing::info!(env = %self.config.env, routes = self.routes().len(), "starting application");
        self.lifecycle().start().await
    }

    /// Runs the shutdown hooks. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Reports every shutdown hook that failed.
    pub async fn stop(&self) -> LifecycleResult {
        tracing::info!("stopping application");
        self.lifecycle().stop().await
    }

    /// Handles one request through the full pipeline.
    pub async fn handle(&self, request: Request) -> Response {
        self.kernel.handle(request).await
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(KilnConfig::default())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("env", &self.config.env)
            .field("debug", &self.config.debug)
            .field("routes", &self.routes().len())
            .field("kernel", &self.kernel)
            .finish_non_exhaustive()
    }
}

fn filtered_error_hook<P, F>(predicate: P, handler: F) -> LifecycleHook
where
    P: Fn(&HandlerError) -> bool + Send + Sync + 'static,
    F: Fn(&HandlerError, &Request) -> HandlerResult<Response> + Send + Sync + 'static,
{
    LifecycleHook::error_sync(move |error, request| {
        if predicate(error) {
            handler(error, request).map(Some)
        } else {
            Ok(None)
        }
    })
}
