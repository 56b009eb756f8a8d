//! Request ID middleware.
//!
//! Gives every request a unique identifier for log correlation. The ID is
//! stored in the request attributes under [`REQUEST_ID_ATTRIBUTE`], written
//! to the request's `X-Request-ID` header for handlers, and echoed on the
//! response.
//!
//! New IDs are UUID v7, which are time-ordered and need no coordination.

use crate::middleware::{Middleware, Next};
use kiln_core::{BoxFuture, HandlerResult, Request, Response};
use std::sync::Arc;
use uuid::Uuid;

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The attribute key holding the request ID as a `String`.
pub const REQUEST_ID_ATTRIBUTE: &str = "request_id";

/// Middleware that generates or extracts request IDs.
///
/// # Behavior
///
/// 1. If incoming IDs are trusted and `X-Request-ID` holds a valid UUID, keep it
/// 2. Otherwise generate a new UUID v7
/// 3. Store the ID in the request attributes and header
/// 4. Add the ID to the response headers
///
/// # Example
///
/// ```
/// use kiln_middleware::{stages::RequestIdMiddleware, MiddlewareChain};
///
/// let chain = MiddlewareChain::new();
/// chain.add(RequestIdMiddleware::new());
/// assert_eq!(chain.names(), vec!["request_id"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    /// Whether to keep a valid incoming `X-Request-ID`.
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Creates a middleware that always generates fresh IDs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware that keeps valid incoming `X-Request-ID` values.
    ///
    /// Use this behind a trusted proxy that already assigns request IDs.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    fn extract_request_id(&self, request: &Request) -> Option<String> {
        if !self.trust_incoming {
            return None;
        }

        request
            .header(REQUEST_ID_HEADER)
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(|uuid| uuid.to_string())
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        Box::pin(async move {
            let request_id = self
                .extract_request_id(request)
                .unwrap_or_else(|| Uuid::now_v7().to_string());

            request
                .headers_mut()
                .insert(REQUEST_ID_HEADER, request_id.clone());
            request
                .attributes()
                .insert(REQUEST_ID_ATTRIBUTE, request_id.clone());

            let response = next.run(request).await?;
            Ok(response.with_header(REQUEST_ID_HEADER, request_id))
        })
    }
}

/// Returns the ID assigned by [`RequestIdMiddleware`], if it ran.
pub fn request_id(request: &Request) -> Option<Arc<String>> {
    request.attributes().get::<String>(REQUEST_ID_ATTRIBUTE)
}
