//! # Kiln
//!
//! **An async request pipeline: routes, onion middleware and lifecycle hooks**
//!
//! Kiln turns an inbound [`Request`](kiln_core::Request) into a
//! [`Response`](kiln_core::Response) through a fixed, deterministic sequence
//! of stages. The transport binding is left to the caller: hand the
//! application a request, get a response back.
//!
//! ## Quick Start
//!
//! ```
//! use kiln::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let app = App::new(KilnConfig::default());
//!
//! app.get("/hello/{name}", |request: Request| async move {
//!     let name = request.path_param("name").unwrap_or("world").to_string();
//!     Ok::<_, HandlerError>(format!("hello {name}"))
//! })
//! .unwrap();
//!
//! app.start().await.unwrap();
//! let response = app.handle(Request::get("/hello/kiln")).await;
//! assert_eq!(response.status_code(), 200);
//! app.stop().await.unwrap();
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → before_request hooks → onion middleware → request middleware → route match → handler
//!                                                                                          ↓
//! Response ← after_request hooks ← onion middleware ← response middleware (reversed) ←────┘
//!
//! on error: exception middleware → error hooks → default error handler
//! ```
//!
//! Every call to [`App::handle`] returns a response: errors and panics are
//! converted, and unmatched routes answer 404.

#![doc(html_root_url = "https://docs.rs/kiln/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;

pub use app::App;

// Re-export core types
pub use kiln_core as core;

// Re-export router types
pub use kiln_router as router;

// Re-export middleware types
pub use kiln_middleware as middleware;

// Re-export kernel and lifecycle types
pub use kiln_kernel as kernel;

// Re-export configuration types
pub use kiln_config as config;

// Re-export logging setup
pub use kiln_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use kiln::prelude::*;
///
/// let app = App::default();
/// assert!(app.routes().is_empty());
/// ```
pub mod prelude {
    pub use crate::App;

    pub use kiln_core::{
        Attributes, BoxFuture, Container, ErrorKind, HandlerError, HandlerResult, Headers,
        IntoResponse, Json, Method, Request, Response, StatusCode,
    };

    pub use kiln_router::{RouteError, Router};

    pub use kiln_middleware::stages::{
        DefaultErrorHandler, ErrorHandlers, RequestIdMiddleware, TraceMiddleware,
    };
    pub use kiln_middleware::{
        Capabilities, ExceptionMiddleware, FnMiddleware, Middleware, Next, RequestMiddleware,
        ResponseMiddleware,
    };

    pub use kiln_kernel::{LifecycleError, LifecycleHook, LifecyclePhase, LifecycleResult};

    pub use kiln_config::{ConfigError, ConfigLoader, KilnConfig};
}
