//! # Kiln Core
//!
//! Core types shared by every Kiln crate:
//!
//! - [`Request`] / [`Response`] - the values flowing through the pipeline
//! - [`Headers`] - ordered, case-insensitive, multi-valued header map
//! - [`Attributes`] - per-request scratch space shared between stages
//! - [`HandlerError`] / [`ErrorKind`] - the pipeline error taxonomy
//! - [`Handler`] - route handler trait and its type-erased form
//! - [`Registry`] - copy-on-write list used by every runtime registry
//! - [`Container`] - type-keyed service container

#![doc(html_root_url = "https://docs.rs/kiln-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod attributes;
pub mod di;
mod error;
mod handler;
mod headers;
mod params;
mod registry;
mod request;
mod response;

pub use attributes::Attributes;
pub use di::{Container, ResolveError};
pub use error::{ErrorKind, HandlerError, HandlerResult, RequestParseError, ResponseError};
pub use handler::{BoxFuture, BoxedHandler, Handler, IntoResponse, Json};
pub use headers::Headers;
pub use params::Params;
pub use registry::Registry;
pub use request::{Request, RequestBuilder};
pub use response::{Response, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};

/// HTTP primitives re-exported for convenience.
pub use http::{Method, StatusCode};
