//! Default exception handling.
//!
//! [`DefaultErrorHandler`] turns any [`HandlerError`] into a JSON response.
//! The kernel uses it as its last resort, and applications may also register
//! it as ordinary exception middleware.
//!
//! Built with [`DefaultErrorHandler::new`] it applies the kind mapping below.
//! Built with [`DefaultErrorHandler::status_only`] every error takes the last
//! row, which is what a bare kernel answers.
//!
//! | Error kind | Status | Body |
//! |---|---|---|
//! | `Validation` | 400 | `{"error": <message>}` |
//! | `Permission` | 403 | `{"error": "Permission denied"}` |
//! | `NotFound` | 404 | `{"error": "Resource not found"}` |
//! | anything else | status hint or 500 | `{"error": <message>, "type": <kind>}` |
//!
//! With `debug` enabled every body also carries `"exception"` and a
//! `"traceback"` array listing the error and its causes.

use crate::capability::ExceptionMiddleware;
use kiln_core::{
    BoxFuture, ErrorKind, HandlerError, HandlerResult, Request, Response, StatusCode,
    APPLICATION_JSON,
};
use serde_json::{json, Value};

/// Maps errors to JSON responses, gating diagnostics on `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultErrorHandler {
    debug: bool,
    map_kinds: bool,
}

impl DefaultErrorHandler {
    /// Creates a handler applying the kind mapping; `debug` controls
    /// diagnostic detail.
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self {
            debug,
            map_kinds: true,
        }
    }

    /// Creates a handler that only honours the status hint, defaulting to 500.
    #[must_use]
    pub const fn status_only(debug: bool) -> Self {
        Self {
            debug,
            map_kinds: false,
        }
    }

    /// Returns a copy with diagnostics switched on or off.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Returns true if diagnostics are included.
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Returns true if the kind mapping applies.
    pub const fn maps_kinds(&self) -> bool {
        self.map_kinds
    }

    /// Builds the response for `error`.
    pub fn respond(&self, error: &HandlerError) -> Response {
        let kind = if self.map_kinds {
            error.kind()
        } else {
            ErrorKind::Internal
        };
        let (status, mut body) = match kind {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, json!({ "error": error.message() })),
            ErrorKind::Permission => (StatusCode::FORBIDDEN, json!({ "error": "Permission denied" })),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Resource not found" })),
            _ => (
                error.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                json!({ "error": error.message(), "type": error.kind().as_str() }),
            ),
        };

        if self.debug {
            if let Value::Object(fields) = &mut body {
                fields.insert("exception".into(), Value::String(error.to_string()));
                fields.insert("type".into(), Value::String(error.kind().as_str().into()));
                fields.insert("traceback".into(), json!(error.chain()));
            }
        }

        json_response(status, &body)
    }
}

impl Default for DefaultErrorHandler {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Builds a JSON response, substituting 500 for statuses outside 100..=599.
pub fn json_response(status: StatusCode, body: &Value) -> Response {
    let response = Response::new(status.as_u16()).unwrap_or_else(|err| {
        tracing::warn!(status = status.as_u16(), error = %err, "invalid error status; using 500");
        Response::server_error(String::new())
    });
    response
        .with_header("Content-Type", APPLICATION_JSON)
        .with_body(body.to_string())
}

impl ExceptionMiddleware for DefaultErrorHandler {
    fn name(&self) -> &'static str {
        "default_error_handler"
    }

    fn process_exception<'a>(
        &'a self,
        _request: &'a Request,
        error: &'a HandlerError,
    ) -> BoxFuture<'a, HandlerResult<Option<Response>>> {
        let response = self.respond(error);
        Box::pin(async move { Ok(Some(response)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(response: &Response) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_validation_maps_to_400() {
        let response = DefaultErrorHandler::new(false).respond(&HandlerError::validation("age must be positive"));

        assert_eq!(response.status_code(), 400);
        assert_eq!(body(&response), json!({ "error": "age must be positive" }));
        assert_eq!(response.header("content-type"), Some(APPLICATION_JSON));
    }

    #[test]
    fn test_permission_and_not_found_hide_message() {
        let handler = DefaultErrorHandler::new(false);

        let response = handler.respond(&HandlerError::permission("user 3 may not delete"));
        assert_eq!(response.status_code(), 403);
        assert_eq!(body(&response), json!({ "error": "Permission denied" }));

        let response = handler.respond(&HandlerError::not_found("/etc/passwd"));
        assert_eq!(response.status_code(), 404);
        assert_eq!(body(&response), json!({ "error": "Resource not found" }));
    }

    #[test]
    fn test_other_errors_default_to_500() {
        let response = DefaultErrorHandler::new(false).respond(&HandlerError::internal("boom"));

        assert_eq!(response.status_code(), 500);
        assert_eq!(body(&response), json!({ "error": "boom", "type": "internal" }));
    }

    #[test]
    fn test_status_hint_is_honoured() {
        let error = HandlerError::internal("slow down").with_status(StatusCode::TOO_MANY_REQUESTS);
        let response = DefaultErrorHandler::new(false).respond(&error);

        assert_eq!(response.status_code(), 429);
    }

    #[test]
    fn test_out_of_range_hint_falls_back_to_500() {
        let status = StatusCode::from_u16(799).unwrap();
        let error = HandlerError::conflict("odd").with_status(status);

        let response = DefaultErrorHandler::new(false).respond(&error);
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_status_only_ignores_kind() {
        let handler = DefaultErrorHandler::status_only(false);

        let response = handler.respond(&HandlerError::validation("bad"));
        assert_eq!(response.status_code(), 500);
        assert_eq!(body(&response), json!({ "error": "bad", "type": "validation" }));

        let hinted = HandlerError::validation("bad").with_status(StatusCode::BAD_REQUEST);
        assert_eq!(handler.respond(&hinted).status_code(), 400);

        let debug = handler.with_debug(true);
        assert!(debug.debug());
        assert!(!debug.maps_kinds());
    }

    #[test]
    fn test_production_has_no_traceback() {
        let response = DefaultErrorHandler::new(false).respond(&HandlerError::internal("boom"));
        let body = body(&response);

        assert!(body.get("traceback").is_none());
        assert!(body.get("exception").is_none());
    }

    #[test]
    fn test_debug_adds_diagnostics() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let error = HandlerError::internal_with_source("query failed", io);

        let response = DefaultErrorHandler::new(true).respond(&error);
        let body = body(&response);

        assert_eq!(body["error"], "query failed");
        assert_eq!(body["type"], "internal");
        assert_eq!(body["exception"], "query failed");
        assert_eq!(
            body["traceback"],
            json!(["internal: query failed", "connection reset"])
        );
    }

    #[tokio::test]
    async fn test_as_exception_middleware() {
        let handler = DefaultErrorHandler::new(false);
        let request = Request::get("/");
        let error = HandlerError::validation("nope");

        let response = handler
            .process_exception(&request, &error)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status_code(), 400);
    }
}
