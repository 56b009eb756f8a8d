//! # Kiln Kernel
//!
//! Lifecycle hooks and the request pipeline orchestrator.
//!
//! - [`LifecycleManager`] - startup/shutdown hooks and per-request
//!   before/after/error hooks
//! - [`Kernel`] - routes one request through hooks, middleware and routers
//!   and always produces a response
//!
//! ## Error flow
//!
//! When any stage fails, the error is offered to exception middleware, then
//! to the lifecycle's error hooks, and finally to the kernel's fallback
//! responder. Panics are caught and treated as internal errors.

#![doc(html_root_url = "https://docs.rs/kiln-kernel/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod kernel;
pub mod lifecycle;

pub use kernel::Kernel;
pub use lifecycle::{
    LifecycleError, LifecycleHook, LifecycleManager, LifecyclePhase, LifecycleResult,
    LifecycleState,
};
