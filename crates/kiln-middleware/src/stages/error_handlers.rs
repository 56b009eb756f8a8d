//! Priority-ordered error handlers.
//!
//! [`ErrorHandlers`] keeps a list of handlers, each bound to an
//! [`ErrorKind`] or to an arbitrary predicate. When an error reaches it, the
//! matching handlers are tried from the highest priority down; handlers with
//! equal priority run in registration order. The first handler that returns
//! a response wins. A handler that fails is logged and skipped.
//!
//! # Example
//!
//! ```
//! use kiln_core::{ErrorKind, Response};
//! use kiln_middleware::stages::ErrorHandlers;
//!
//! let handlers = ErrorHandlers::new();
//! handlers.register(ErrorKind::Conflict, 0, |error, _request| {
//!     Ok(Response::new(409)?.with_body(error.message().to_string()))
//! });
//! assert_eq!(handlers.len(), 1);
//! ```

use crate::capability::ExceptionMiddleware;
use kiln_core::{BoxFuture, ErrorKind, HandlerError, HandlerResult, Registry, Request, Response};
use std::cmp::Reverse;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type HandlerFn = dyn Fn(&HandlerError, &Request) -> HandlerResult<Response> + Send + Sync;
type PredicateFn = dyn Fn(&HandlerError) -> bool + Send + Sync;

/// Identifies a registered handler so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

enum Matcher {
    Kind(ErrorKind),
    Predicate(Box<PredicateFn>),
}

impl Matcher {
    fn matches(&self, error: &HandlerError) -> bool {
        match self {
            Self::Kind(kind) => error.kind() == *kind,
            Self::Predicate(predicate) => predicate(error),
        }
    }
}

struct Entry {
    id: HandlerId,
    priority: i32,
    matcher: Matcher,
    handler: Box<HandlerFn>,
}

/// Typed error handlers, consulted by priority.
#[derive(Default)]
pub struct ErrorHandlers {
    entries: Registry<Arc<Entry>>,
    next_id: AtomicU64,
}

impl ErrorHandlers {
    /// Creates an empty set of handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for errors of `kind`.
    pub fn register<F>(&self, kind: ErrorKind, priority: i32, handler: F) -> HandlerId
    where
        F: Fn(&HandlerError, &Request) -> HandlerResult<Response> + Send + Sync + 'static,
    {
        self.push(Matcher::Kind(kind), priority, Box::new(handler))
    }

    /// Registers `handler` for errors accepted by `predicate`.
    pub fn register_where<P, F>(&self, predicate: P, priority: i32, handler: F) -> HandlerId
    where
        P: Fn(&HandlerError) -> bool + Send + Sync + 'static,
        F: Fn(&HandlerError, &Request) -> HandlerResult<Response> + Send + Sync + 'static,
    {
        self.push(
            Matcher::Predicate(Box::new(predicate)),
            priority,
            Box::new(handler),
        )
    }

    /// Removes a handler. Returns false if it was not registered.
    pub fn unregister(&self, id: HandlerId) -> bool {
        self.entries.remove_where(|entry| entry.id == id) > 0
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the first matching handler that succeeds.
    pub fn handle(&self, error: &HandlerError, request: &Request) -> Option<Response> {
        let snapshot = self.entries.snapshot();
        let mut candidates: Vec<&Entry> = snapshot
            .iter()
            .map(Arc::as_ref)
            .filter(|entry| entry.matcher.matches(error))
            .collect();
        // stable: ties keep registration order
        candidates.sort_by_key(|entry| Reverse(entry.priority));

        for entry in candidates {
            match (entry.handler)(error, request) {
                Ok(response) => return Some(response),
                Err(failure) => {
                    tracing::warn!(
                        handler = ?entry.id,
                        priority = entry.priority,
                        error = %failure,
                        original_error = %error,
                        "error handler failed; trying next"
                    );
                }
            }
        }
        None
    }

    fn push(&self, matcher: Matcher, priority: i32, handler: Box<HandlerFn>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(handler = ?id, priority, "registering error handler");
        self.entries.push(Arc::new(Entry {
            id,
            priority,
            matcher,
            handler,
        }));
        id
    }
}

impl ExceptionMiddleware for ErrorHandlers {
    fn name(&self) -> &'static str {
        "error_handlers"
    }

    fn process_exception<'a>(
        &'a self,
        request: &'a Request,
        error: &'a HandlerError,
    ) -> BoxFuture<'a, HandlerResult<Option<Response>>> {
        let response = self.handle(error, request);
        Box::pin(async move { Ok(response) })
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlers")
            .field("handlers", &self.entries.len())
            .finish()
    }
}
