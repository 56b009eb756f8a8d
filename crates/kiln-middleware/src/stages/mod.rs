//! Built-in middleware stages.
//!
//! Onion stages, added with [`MiddlewareChain::add`](crate::MiddlewareChain::add):
//!
//! - [`request_id`] - generate or propagate `X-Request-ID` (UUID v7)
//! - [`trace`] - per-request `tracing` span and completion log
//!
//! Exception stages, added with
//! [`MiddlewareManager::add_exception`](crate::MiddlewareManager::add_exception):
//!
//! - [`error_handling`] - default error to JSON response mapping
//! - [`error_handlers`] - priority-ordered handlers per error kind

pub mod error_handlers;
pub mod error_handling;
pub mod request_id;
pub mod trace;

pub use error_handlers::{ErrorHandlers, HandlerId};
pub use error_handling::{json_response, DefaultErrorHandler};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_ATTRIBUTE, REQUEST_ID_HEADER};
pub use trace::TraceMiddleware;
