//! Route handler trait and type erasure.
//!
//! Route tables store handlers of many concrete types side by side, so every
//! handler is erased behind [`BoxedHandler`]. Any async function or closure
//! taking a [`Request`] and returning `HandlerResult<impl IntoResponse>`
//! implements [`Handler`] automatically:
//!
//! ```
//! use kiln_core::{HandlerResult, Request, Response};
//!
//! async fn show_user(request: Request) -> HandlerResult<Response> {
//!     let id = request.path_param("id").unwrap_or_default().to_string();
//!     Ok(Response::json(&serde_json::json!({ "id": id }))?)
//! }
//!
//! fn assert_handler<H: kiln_core::Handler>(_: H) {}
//! assert_handler(show_user);
//! ```

use crate::error::{HandlerError, HandlerResult};
use crate::request::Request;
use crate::response::Response;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Something that answers a matched request.
pub trait Handler: Send + Sync + 'static {
    /// Handles the request. Route parameters are already populated.
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult<Response>>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: Request) -> BoxFuture<'static, HandlerResult<Response>> {
        let fut = (self)(request);
        Box::pin(async move { fut.await?.into_response() })
    }
}

/// Conversion of handler return values into a [`Response`].
pub trait IntoResponse {
    /// Performs the conversion.
    fn into_response(self) -> HandlerResult<Response>;
}

impl IntoResponse for Response {
    fn into_response(self) -> HandlerResult<Response> {
        Ok(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> HandlerResult<Response> {
        Ok(Response::text(self))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> HandlerResult<Response> {
        Ok(Response::text(self))
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> HandlerResult<Response> {
        Ok(Response::json(&self)?)
    }
}

/// Serializes the wrapped value as a `200` JSON response.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> HandlerResult<Response> {
        Response::json(&self.0).map_err(HandlerError::from)
    }
}
