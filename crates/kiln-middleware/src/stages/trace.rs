//! Request tracing middleware.
//!
//! Opens a `tracing` span around the rest of the chain and logs one line per
//! request once the response (or error) is known.
//!
//! ## Span Fields
//!
//! - `method` - HTTP method
//! - `path` - request path
//! - `request_id` - set when [`RequestIdMiddleware`](super::RequestIdMiddleware) ran first
//! - `status` - response status, recorded on completion

use super::request_id::request_id;
use crate::middleware::{Middleware, Next};
use kiln_core::{BoxFuture, HandlerResult, Request, Response};
use std::time::Instant;
use tracing::field::Empty;
use tracing::Instrument;

/// Middleware that traces each request.
#[derive(Debug, Clone, Default)]
pub struct TraceMiddleware {
    _private: (),
}

impl TraceMiddleware {
    /// Creates a new tracing middleware.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Middleware for TraceMiddleware {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn process<'a>(
        &'a self,
        request: &'a mut Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult<Response>> {
        let span = tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.path(),
            request_id = Empty,
            status = Empty,
        );
        if let Some(id) = request_id(request) {
            span.record("request_id", id.as_str());
        }

        let record = span.clone();
        Box::pin(
            async move {
                let start = Instant::now();
                let result = next.run(request).await;
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

                match &result {
                    Ok(response) => {
                        record.record("status", response.status_code());
                        tracing::info!(
                            status = response.status_code(),
                            duration_ms,
                            "request completed"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(
                            kind = %error.kind(),
                            error = %error,
                            duration_ms,
                            "request failed"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
