//! # Kiln Middleware
//!
//! Middleware for the Kiln request pipeline.
//!
//! Two styles are supported and may be mixed:
//!
//! - **Onion middleware** ([`Middleware`]) wraps the rest of the chain. Each
//!   layer receives the request and a [`Next`] continuation, so it can act
//!   before and after the inner layers or short-circuit them.
//! - **Capability middleware** ([`RequestMiddleware`], [`ResponseMiddleware`],
//!   [`ExceptionMiddleware`]) hooks a single point of the pipeline.
//!
//! ## Execution Order
//!
//! ```text
//! onion m1 → onion m2 → request caps (in order) → route dispatch
//!                                                       ↓
//! onion m1 ← onion m2 ← response caps (reversed) ←──────┘
//!
//! on error: exception caps in order, first response wins
//! ```
//!
//! [`MiddlewareManager`] owns all four lists. Registration takes `&self` and
//! is safe while requests are being served.
//!
//! ## Built-in Stages
//!
//! See [`stages`]: request IDs, tracing, the default error mapping and
//! priority-ordered error handlers.

#![doc(html_root_url = "https://docs.rs/kiln-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod chain;
pub mod middleware;
pub mod stages;

pub use capability::{
    Capabilities, ExceptionMiddleware, MiddlewareManager, Registered, RequestMiddleware,
    ResponseMiddleware,
};
pub use chain::MiddlewareChain;
pub use middleware::{BoxedMiddleware, Endpoint, FnEndpoint, FnMiddleware, Middleware, Next};
