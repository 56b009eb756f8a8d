//! Lifecycle hooks.
//!
//! The [`LifecycleManager`] keeps hooks for five phases:
//!
//! | Phase | Driven by | Hook receives | Hook returns |
//! |-------|-----------|---------------|--------------|
//! | `Startup` | [`start`](LifecycleManager::start) | nothing | `LifecycleResult` |
//! | `Shutdown` | [`stop`](LifecycleManager::stop) | nothing | `LifecycleResult` |
//! | `BeforeRequest` | every request | the request | a replacement request or `None` |
//! | `AfterRequest` | every successful request | request, response | a replacement response or `None` |
//! | `Error` | every failed request | error, request | a response or `None` |
//!
//! Every hook can be written as an async closure or as a plain function;
//! both kinds live in the same list.
//!
//! # Execution Order
//!
//! - **Startup hooks**: registration order; the first failure aborts startup
//! - **Shutdown hooks**: reverse registration order; failures are collected
//! - **Request hooks**: registration order, each seeing the previous result
//! - **Error hooks**: registration order; the first response wins and
//!   failing hooks are skipped
//!
//! # Example
//!
//! ```
//! use kiln_kernel::{LifecycleHook, LifecycleManager, LifecyclePhase};
//!
//! # tokio_test::block_on(async {
//! let lifecycle = LifecycleManager::new();
//! lifecycle.on_startup(|| async { Ok(()) });
//! lifecycle.on(LifecycleHook::before_request_sync(|request| {
//!     request.attributes().insert("seen", true);
//!     Ok(None)
//! }));
//!
//! lifecycle.start().await.unwrap();
//! assert_eq!(lifecycle.hook_count(LifecyclePhase::BeforeRequest), 1);
//! # });
//! ```

use futures_util::FutureExt;
use kiln_core::{BoxFuture, HandlerError, HandlerResult, Registry, Request, Response};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// Error type for startup and shutdown hook failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A startup hook failed.
    #[error("Startup hook failed: {0}")]
    StartupFailed(String),

    /// One or more shutdown hooks failed.
    #[error("Shutdown hook failed: {0}")]
    ShutdownFailed(String),

    /// Generic hook error with source.
    #[error("Lifecycle hook error: {message}")]
    HookError {
        /// Error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LifecycleError {
    /// Creates a new hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::HookError {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new hook error with a source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::HookError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for startup and shutdown hooks.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// A point in the application's life where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Once, when the application starts.
    Startup,
    /// Once, when the application stops.
    Shutdown,
    /// Before each request enters the middleware chain.
    BeforeRequest,
    /// After each successful request.
    AfterRequest,
    /// When a request fails and exception middleware did not answer.
    Error,
}

impl LifecyclePhase {
    /// Every phase, in the order a request lifetime meets them.
    pub const ALL: [Self; 5] = [
        Self::Startup,
        Self::BeforeRequest,
        Self::AfterRequest,
        Self::Error,
        Self::Shutdown,
    ];

    /// Returns the phase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::BeforeRequest => "before_request",
            Self::AfterRequest => "after_request",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the manager is in its linear `NotStarted → Started → Stopped` life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Startup hooks have not completed.
    #[default]
    NotStarted,
    /// Startup hooks ran successfully.
    Started,
    /// Shutdown hooks ran.
    Stopped,
}

type PhaseFn = dyn Fn() -> BoxFuture<'static, LifecycleResult> + Send + Sync;
type BeforeFn = dyn Fn(Request) -> BoxFuture<'static, HandlerResult<Option<Request>>> + Send + Sync;
type AfterFn =
    dyn Fn(Request, Response) -> BoxFuture<'static, HandlerResult<Option<Response>>> + Send + Sync;
type ErrorFn = dyn Fn(Arc<HandlerError>, Request) -> BoxFuture<'static, HandlerResult<Option<Response>>>
    + Send
    + Sync;

#[derive(Clone)]
enum HookFn {
    Startup(Arc<PhaseFn>),
    Shutdown(Arc<PhaseFn>),
    BeforeRequest(Arc<BeforeFn>),
    AfterRequest(Arc<AfterFn>),
    Error(Arc<ErrorFn>),
}

/// A hook bound to its phase, ready to be registered with
/// [`LifecycleManager::on`].
#[derive(Clone)]
pub struct LifecycleHook {
    name: Option<String>,
    func: HookFn,
}

impl LifecycleHook {
    fn new(func: HookFn) -> Self {
        Self { name: None, func }
    }

    /// Names the hook for logs. Unnamed hooks get `"{phase}_{index}"`.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the phase this hook belongs to.
    pub fn phase(&self) -> LifecyclePhase {
        match self.func {
            HookFn::Startup(_) => LifecyclePhase::Startup,
            HookFn::Shutdown(_) => LifecyclePhase::Shutdown,
            HookFn::BeforeRequest(_) => LifecyclePhase::BeforeRequest,
            HookFn::AfterRequest(_) => LifecyclePhase::AfterRequest,
            HookFn::Error(_) => LifecyclePhase::Error,
        }
    }

    /// Returns the explicit name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// An async startup hook.
    pub fn startup<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        Self::new(HookFn::Startup(phase_fn(hook)))
    }

    /// A synchronous startup hook.
    pub fn startup_sync<F>(hook: F) -> Self
    where
        F: Fn() -> LifecycleResult + Send + Sync + 'static,
    {
        Self::new(HookFn::Startup(phase_fn_sync(hook)))
    }

    /// An async shutdown hook.
    pub fn shutdown<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        Self::new(HookFn::Shutdown(phase_fn(hook)))
    }

    /// A synchronous shutdown hook.
    pub fn shutdown_sync<F>(hook: F) -> Self
    where
        F: Fn() -> LifecycleResult + Send + Sync + 'static,
    {
        Self::new(HookFn::Shutdown(phase_fn_sync(hook)))
    }

    /// An async before-request hook. Returning `None` keeps the request.
    pub fn before_request<F, Fut>(hook: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Request>>> + Send + 'static,
    {
        Self::new(HookFn::BeforeRequest(Arc::new(
            move |request| -> BoxFuture<'static, HandlerResult<Option<Request>>> {
                Box::pin(hook(request))
            },
        )))
    }

    /// A synchronous before-request hook. Returning `None` keeps the request.
    pub fn before_request_sync<F>(hook: F) -> Self
    where
        F: Fn(&Request) -> HandlerResult<Option<Request>> + Send + Sync + 'static,
    {
        Self::new(HookFn::BeforeRequest(Arc::new(
            move |request: Request| -> BoxFuture<'static, HandlerResult<Option<Request>>> {
                let result = hook(&request);
                Box::pin(async move { result })
            },
        )))
    }

    /// An async after-request hook. Returning `None` keeps the response.
    pub fn after_request<F, Fut>(hook: F) -> Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Response>>> + Send + 'static,
    {
        Self::new(HookFn::AfterRequest(Arc::new(
            move |request, response| -> BoxFuture<'static, HandlerResult<Option<Response>>> {
                Box::pin(hook(request, response))
            },
        )))
    }

    /// A synchronous after-request hook. Returning `None` keeps the response.
    pub fn after_request_sync<F>(hook: F) -> Self
    where
        F: Fn(&Request, &Response) -> HandlerResult<Option<Response>> + Send + Sync + 'static,
    {
        Self::new(HookFn::AfterRequest(Arc::new(
            move |request: Request,
                  response: Response|
                  -> BoxFuture<'static, HandlerResult<Option<Response>>> {
                let result = hook(&request, &response);
                Box::pin(async move { result })
            },
        )))
    }

    /// An async error hook. Returning `None` lets the next hook try.
    pub fn error<F, Fut>(hook: F) -> Self
    where
        F: Fn(Arc<HandlerError>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Response>>> + Send + 'static,
    {
        Self::new(HookFn::Error(Arc::new(
            move |error, request| -> BoxFuture<'static, HandlerResult<Option<Response>>> {
                Box::pin(hook(error, request))
            },
        )))
    }

    /// A synchronous error hook. Returning `None` lets the next hook try.
    pub fn error_sync<F>(hook: F) -> Self
    where
        F: Fn(&HandlerError, &Request) -> HandlerResult<Option<Response>> + Send + Sync + 'static,
    {
        Self::new(HookFn::Error(Arc::new(
            move |error: Arc<HandlerError>,
                  request: Request|
                  -> BoxFuture<'static, HandlerResult<Option<Response>>> {
                let result = hook(&error, &request);
                Box::pin(async move { result })
            },
        )))
    }
}

impl fmt::Debug for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHook")
            .field("phase", &self.phase())
            .field("name", &self.name)
            .finish()
    }
}

fn phase_fn<F, Fut>(hook: F) -> Arc<PhaseFn>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LifecycleResult> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, LifecycleResult> { Box::pin(hook()) })
}

fn phase_fn_sync<F>(hook: F) -> Arc<PhaseFn>
where
    F: Fn() -> LifecycleResult + Send + Sync + 'static,
{
    Arc::new(move || -> BoxFuture<'static, LifecycleResult> {
        let result = hook();
        Box::pin(async move { result })
    })
}

struct Named<F: ?Sized> {
    name: String,
    func: Arc<F>,
}

impl<F: ?Sized> Clone for Named<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

/// Registry and driver for lifecycle hooks.
///
/// Hooks can be registered at any time through `&self`; a phase that is
/// already running keeps the hooks it started with.
#[derive(Default)]
pub struct LifecycleManager {
    startup: Registry<Named<PhaseFn>>,
    shutdown: Registry<Named<PhaseFn>>,
    before_request: Registry<Named<BeforeFn>>,
    after_request: Registry<Named<AfterFn>>,
    error: Registry<Named<ErrorFn>>,
    state: parking_lot::Mutex<LifecycleState>,
    transition: tokio::sync::Mutex<()>,
}

impl LifecycleManager {
    /// Creates a manager with no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` under its own phase.
    pub fn on(&self, hook: LifecycleHook) {
        let phase = hook.phase();
        let name = hook
            .name
            .unwrap_or_else(|| format!("{phase}_{}", self.hook_count(phase)));
        tracing::debug!(hook = %name, %phase, "registering lifecycle hook");

        match hook.func {
            HookFn::Startup(func) => self.startup.push(Named { name, func }),
            HookFn::Shutdown(func) => self.shutdown.push(Named { name, func }),
            HookFn::BeforeRequest(func) => self.before_request.push(Named { name, func }),
            HookFn::AfterRequest(func) => self.after_request.push(Named { name, func }),
            HookFn::Error(func) => self.error.push(Named { name, func }),
        }
    }

    /// Registers an async startup hook.
    pub fn on_startup<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.on(LifecycleHook::startup(hook));
    }

    /// Registers an async shutdown hook.
    pub fn on_shutdown<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.on(LifecycleHook::shutdown(hook));
    }

    /// Registers an async before-request hook.
    pub fn on_before_request<F, Fut>(&self, hook: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Request>>> + Send + 'static,
    {
        self.on(LifecycleHook::before_request(hook));
    }

    /// Registers an async after-request hook.
    pub fn on_after_request<F, Fut>(&self, hook: F)
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Response>>> + Send + 'static,
    {
        self.on(LifecycleHook::after_request(hook));
    }

    /// Registers an async error hook.
    pub fn on_error<F, Fut>(&self, hook: F)
    where
        F: Fn(Arc<HandlerError>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Option<Response>>> + Send + 'static,
    {
        self.on(LifecycleHook::error(hook));
    }

    /// Returns the number of hooks registered for `phase`.
    pub fn hook_count(&self, phase: LifecyclePhase) -> usize {
        match phase {
            LifecyclePhase::Startup => self.startup.len(),
            LifecyclePhase::Shutdown => self.shutdown.len(),
            LifecyclePhase::BeforeRequest => self.before_request.len(),
            LifecyclePhase::AfterRequest => self.after_request.len(),
            LifecyclePhase::Error => self.error.len(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Runs the startup hooks in registration order.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StartupFailed`] for the first hook that
    /// fails. The remaining hooks are skipped and the manager stays
    /// `NotStarted`, so `start` may be retried.
    pub async fn start(&self) -> LifecycleResult {
        let _transition = self.transition.lock().await;
        if self.state() != LifecycleState::NotStarted {
            tracing::debug!(state = ?self.state(), "start ignored");
            return Ok(());
        }

        for hook in self.startup.snapshot().iter() {
            tracing::debug!(hook = %hook.name, "Running startup hook");
            match (hook.func)().await {
                Ok(()) => {
                    tracing::debug!(hook = %hook.name, "Startup hook completed");
                }
                Err(e) => {
                    tracing::error!(hook = %hook.name, error = %e, "Startup hook failed");
                    return Err(LifecycleError::StartupFailed(format!(
                        "Hook '{}' failed: {}",
                        hook.name, e
                    )));
                }
            }
        }

        *self.state.lock() = LifecycleState::Started;
        tracing::info!("application started");
        Ok(())
    }

    /// Runs the shutdown hooks in reverse registration order.
    ///
    /// Does nothing unless the manager is `Started`. Every hook runs even if
    /// an earlier one fails; the manager ends `Stopped` either way.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ShutdownFailed`] summarising every failure.
    pub async fn stop(&self) -> LifecycleResult {
        let _transition = self.transition.lock().await;
        if self.state() != LifecycleState::Started {
            tracing::debug!(state = ?self.state(), "stop ignored");
            return Ok(());
        }

        let mut errors: Vec<String> = Vec::new();
        for hook in self.shutdown.snapshot().iter().rev() {
            tracing::debug!(hook = %hook.name, "Running shutdown hook");
            match (hook.func)().await {
                Ok(()) => {
                    tracing::debug!(hook = %hook.name, "Shutdown hook completed");
                }
                Err(e) => {
                    tracing::error!(hook = %hook.name, error = %e, "Shutdown hook failed");
                    errors.push(format!("{}: {}", hook.name, e));
                }
            }
        }

        *self.state.lock() = LifecycleState::Stopped;
        tracing::info!("application stopped");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed(errors.join("; ")))
        }
    }

    /// Folds the before-request hooks over `request`.
    ///
    /// A hook returning `None` leaves the current request in place.
    ///
    /// # Errors
    ///
    /// A failing hook aborts the fold; the error enters the pipeline's
    /// error handling like any other.
    pub async fn before_request(&self, request: Request) -> HandlerResult<Request> {
        let mut current = request;
        for hook in self.before_request.snapshot().iter() {
            if let Some(replacement) = (hook.func)(current.clone()).await? {
                tracing::trace!(hook = %hook.name, "before-request hook replaced the request");
                current = replacement;
            }
        }
        Ok(current)
    }

    /// Folds the after-request hooks over `response`.
    ///
    /// # Errors
    ///
    /// A failing hook aborts the fold.
    pub async fn after_request(
        &self,
        request: &Request,
        response: Response,
    ) -> HandlerResult<Response> {
        let mut current = response;
        for hook in self.after_request.snapshot().iter() {
            if let Some(replacement) = (hook.func)(request.clone(), current.clone()).await? {
                tracing::trace!(hook = %hook.name, "after-request hook replaced the response");
                current = replacement;
            }
        }
        Ok(current)
    }

    /// Offers `error` to the error hooks in registration order.
    ///
    /// Returns the first response produced. Hooks that fail or panic are
    /// logged and skipped. `None` means no hook handled the error.
    pub async fn handle_error(&self, error: Arc<HandlerError>, request: &Request) -> Option<Response> {
        for hook in self.error.snapshot().iter() {
            let outcome = AssertUnwindSafe(async {
                (hook.func)(Arc::clone(&error), request.clone()).await
            })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic.as_ref())));

            match outcome {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(failure) => {
                    tracing::warn!(
                        hook = %hook.name,
                        error = %failure,
                        original_error = %error,
                        "error hook failed; trying next"
                    );
                }
            }
        }
        None
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("state", &self.state())
            .field("startup_hooks", &self.startup.len())
            .field("shutdown_hooks", &self.shutdown.len())
            .field("before_request_hooks", &self.before_request.len())
            .field("after_request_hooks", &self.after_request.len())
            .field("error_hooks", &self.error.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Order = Arc<parking_lot::Mutex<Vec<u32>>>;

    fn push_startup(lifecycle: &LifecycleManager, order: &Order, n: u32) {
        let order = Arc::clone(order);
        lifecycle.on_startup(move || {
            let order = Arc::clone(&order);
            async move {
                order.lock().push(n);
                Ok(())
            }
        });
    }

    fn push_shutdown(lifecycle: &LifecycleManager, order: &Order, n: u32) {
        let order = Arc::clone(order);
        lifecycle.on_shutdown(move || {
            let order = Arc::clone(&order);
            async move {
                order.lock().push(n);
                Ok(())
            }
        });
    }

    #[tokio::test]
    async fn test_empty_lifecycle() {
        let lifecycle = LifecycleManager::new();

        assert!(lifecycle.start().await.is_ok());
        assert!(lifecycle.stop().await.is_ok());
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let lifecycle = LifecycleManager::new();
        let counted = Arc::clone(&counter);
        lifecycle.on(LifecycleHook::startup_sync(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        lifecycle.start().await.unwrap();
        lifecycle.start().await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.state(), LifecycleState::Started);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let order = Order::default();
        let lifecycle = LifecycleManager::new();
        push_shutdown(&lifecycle, &order, 1);

        lifecycle.stop().await.unwrap();

        assert!(order.lock().is_empty());
        assert_eq!(lifecycle.state(), LifecycleState::NotStarted);
    }

    #[tokio::test]
    async fn test_startup_order_and_shutdown_reverse() {
        let order = Order::default();
        let lifecycle = LifecycleManager::new();
        for n in 1..=3 {
            push_startup(&lifecycle, &order, n);
            push_shutdown(&lifecycle, &order, n + 10);
        }

        lifecycle.start().await.unwrap();
        lifecycle.stop().await.unwrap();
        lifecycle.stop().await.unwrap();

        assert_eq!(*order.lock(), vec![1, 2, 3, 13, 12, 11]);
    }

    #[tokio::test]
    async fn test_startup_stops_on_failure_and_can_retry() {
        let order = Order::default();
        let lifecycle = LifecycleManager::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        push_startup(&lifecycle, &order, 1);
        let counted = Arc::clone(&attempts);
        lifecycle.on(
            LifecycleHook::startup_sync(move || {
                if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(LifecycleError::new("database unreachable"))
                } else {
                    Ok(())
                }
            })
            .named("database_init"),
        );
        push_startup(&lifecycle, &order, 3);

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::StartupFailed(_)));
        assert!(err.to_string().contains("database_init"));
        assert_eq!(*order.lock(), vec![1]);
        assert_eq!(lifecycle.state(), LifecycleState::NotStarted);

        lifecycle.start().await.unwrap();
        assert_eq!(*order.lock(), vec![1, 1, 3]);
        assert_eq!(lifecycle.state(), LifecycleState::Started);
    }

    #[tokio::test]
    async fn test_shutdown_continues_on_failure() {
        let order = Order::default();
        let lifecycle = LifecycleManager::new();
        push_shutdown(&lifecycle, &order, 1);
        lifecycle.on(LifecycleHook::shutdown_sync(|| Err(LifecycleError::new("flush failed"))));
        push_shutdown(&lifecycle, &order, 3);

        lifecycle.start().await.unwrap();
        let err = lifecycle.stop().await.unwrap_err();

        assert!(matches!(err, LifecycleError::ShutdownFailed(_)));
        assert!(err.to_string().contains("shutdown_1"));
        assert_eq!(*order.lock(), vec![3, 1]);
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_before_request_none_keeps_request() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on(LifecycleHook::before_request_sync(|_request| Ok(None)));
        lifecycle.on_before_request(|request: Request| async move {
            Ok(Some(request.with_header("x-stage", "second")))
        });
        lifecycle.on(LifecycleHook::before_request_sync(|_request| Ok(None)));

        let request = lifecycle.before_request(Request::get("/")).await.unwrap();
        assert_eq!(request.header("x-stage"), Some("second"));
    }

    #[tokio::test]
    async fn test_before_request_failure_propagates() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on(LifecycleHook::before_request_sync(|_request| {
            Err(HandlerError::unauthorized("missing token"))
        }));

        let err = lifecycle.before_request(Request::get("/")).await.unwrap_err();
        assert_eq!(err.message(), "missing token");
    }

    #[tokio::test]
    async fn test_after_request_folds_responses() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on_after_request(|_request, response: Response| async move {
            Ok(Some(response.append_header("x-after", "1")))
        });
        lifecycle.on(LifecycleHook::after_request_sync(|_request, _response| Ok(None)));
        lifecycle.on_after_request(|_request, response: Response| async move {
            Ok(Some(response.append_header("x-after", "2")))
        });

        let request = Request::get("/");
        let response = lifecycle.after_request(&request, Response::ok()).await.unwrap();
        assert_eq!(
            response.headers().get_all("x-after").collect::<Vec<_>>(),
            vec!["1", "2"]
        );
    }

    #[tokio::test]
    async fn test_error_hooks_skip_failures() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on(LifecycleHook::error_sync(|_error, _request| {
            Err(HandlerError::internal("hook raised"))
        }));
        lifecycle.on(LifecycleHook::error_sync(|_error, _request| Ok(None)));
        lifecycle.on(LifecycleHook::error_sync(|_error, _request| {
            Ok(Some(Response::new(503)?))
        }));
        lifecycle.on(LifecycleHook::error_sync(|_error, _request| {
            Ok(Some(Response::new(500)?))
        }));

        let error = Arc::new(HandlerError::internal("boom"));
        let response = lifecycle
            .handle_error(error, &Request::get("/"))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 503);
    }

    #[tokio::test]
    async fn test_error_hooks_skip_panics() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on(LifecycleHook::error_sync(|_error, _request| panic!("sync hook raised")));
        lifecycle.on_error(|_error, _request| async { panic!("async hook raised") });
        lifecycle.on(LifecycleHook::error_sync(|error, _request| {
            Ok(Some(Response::new(503)?.with_body(error.message().to_string())))
        }));

        let error = Arc::new(HandlerError::internal("boom"));
        let response = lifecycle
            .handle_error(error, &Request::get("/"))
            .await
            .unwrap();
        assert_eq!(response.status_code(), 503);
        assert_eq!(response.body().as_ref(), b"boom");
    }

    #[tokio::test]
    async fn test_error_hooks_unhandled() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on_error(|_error, _request| async { Ok(None) });

        let error = Arc::new(HandlerError::internal("boom"));
        assert!(lifecycle.handle_error(error, &Request::get("/")).await.is_none());
    }

    #[test]
    fn test_phase_display_and_counts() {
        let lifecycle = LifecycleManager::new();
        lifecycle.on_startup(|| async { Ok(()) });
        lifecycle.on(LifecycleHook::error_sync(|_error, _request| Ok(None)).named("audit"));

        assert_eq!(LifecyclePhase::BeforeRequest.to_string(), "before_request");
        assert_eq!(lifecycle.hook_count(LifecyclePhase::Startup), 1);
        assert_eq!(lifecycle.hook_count(LifecyclePhase::Error), 1);
        assert_eq!(lifecycle.hook_count(LifecyclePhase::Shutdown), 0);

        let debug = format!("{lifecycle:?}");
        assert!(debug.contains("LifecycleManager"));
        assert!(debug.contains("startup_hooks"));
    }

    #[test]
    fn test_error_message() {
        let err = LifecycleError::new("test message");
        assert!(err.to_string().contains("test message"));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = LifecycleError::with_source("close failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
