//! Error types for Kiln.
//!
//! [`HandlerError`] is the error type flowing through the request pipeline.
//! Every handler, middleware and lifecycle hook reports failure with it, and
//! the kernel converts it into a [`Response`](crate::Response) before it can
//! reach the transport.
//!
//! Instead of dispatching on concrete error types, errors carry an
//! [`ErrorKind`] tag. Exception middleware and error hooks match on the tag:
//!
//! | `ErrorKind` | Default status |
//! |---|---|
//! | `Validation` | 400 |
//! | `Unauthorized` | 401 |
//! | `Permission` | 403 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Internal` | 500 |
//!
//! The default status is only used by the default exception handler. The
//! kernel's last-resort fallback honours the explicit status hint set with
//! [`HandlerError::with_status`] and otherwise answers 500.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Result type alias using [`HandlerError`].
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Classification tag for pipeline errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid input value or failed validation.
    Validation,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Caller is not allowed to perform the operation.
    Permission,
    /// A requested resource does not exist.
    NotFound,
    /// Conflicting modification.
    Conflict,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status the default exception handler uses for this kind.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Permission => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the stable snake_case name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Permission => "permission",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while processing a request.
///
/// # Example
///
/// ```
/// use kiln_core::{ErrorKind, HandlerError};
/// use http::StatusCode;
///
/// let err = HandlerError::validation("name must not be empty");
/// assert_eq!(err.kind(), ErrorKind::Validation);
/// assert_eq!(err.status_code(), None);
///
/// let err = HandlerError::internal("quota exceeded").with_status(StatusCode::TOO_MANY_REQUESTS);
/// assert_eq!(err.status_code(), Some(StatusCode::TOO_MANY_REQUESTS));
/// ```
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    #[source]
    source: Option<anyhow::Error>,
}

impl HandlerError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Creates a permission error.
    #[must_use]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// Creates a missing-resource error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Creates an internal error wrapping a lower-level cause.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::internal(message).with_source(source)
    }

    /// Converts a caught panic payload into an internal error.
    ///
    /// The message is `panic: <payload>` when the payload is a string.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::internal(format!("panic: {message}"))
    }

    /// Attaches an explicit HTTP status hint.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches an underlying cause.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the error kind.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the explicit status hint, if one was attached.
    pub const fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the error followed by each of its causes, outermost first.
    ///
    /// Debug-mode error bodies expose this as their `traceback`.
    pub fn chain(&self) -> Vec<String> {
        let mut lines = vec![format!("{}: {}", self.kind, self.message)];
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            lines.push(err.to_string());
            cause = err.source();
        }
        lines
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string()).with_source(err)
    }
}

impl From<ResponseError> for HandlerError {
    fn from(err: ResponseError) -> Self {
        Self::internal(err.to_string()).with_source(err)
    }
}

impl From<RequestParseError> for HandlerError {
    fn from(err: RequestParseError) -> Self {
        Self::validation(err.to_string()).with_source(err)
    }
}

/// Errors raised while constructing a [`Response`](crate::Response).
#[derive(Error, Debug)]
pub enum ResponseError {
    /// Status code outside 100..=599.
    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),

    /// Payload could not be serialized to JSON.
    #[error("Failed to serialize data to JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while decoding a request body.
#[derive(Error, Debug)]
pub enum RequestParseError {
    /// Method is not a valid HTTP token.
    #[error("Invalid request method: {0}")]
    InvalidMethod(String),

    /// Body is not valid JSON for the requested type.
    #[error("Failed to parse JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Body is not valid UTF-8.
    #[error("Request body is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// Form field could not be percent-decoded.
    #[error("Failed to parse form data: {0}")]
    Form(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_default_status_codes() {
        assert_eq!(ErrorKind::Validation.default_status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Permission.default_status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.default_status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorKind::Internal.default_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_hint_is_optional() {
        let err = HandlerError::internal("boom");
        assert_eq!(err.status_code(), None);

        let err = err.with_status(StatusCode::BAD_REQUEST);
        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_display_is_message() {
        let err = HandlerError::not_found("user 7 does not exist");
        assert_eq!(err.to_string(), "user 7 does not exist");
    }

    #[test]
    fn test_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = HandlerError::internal_with_source("could not save", io);

        let chain = err.chain();
        assert_eq!(chain[0], "internal: could not save");
        assert_eq!(chain[1], "disk on fire");
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = HandlerError::from_panic(&"static message");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.message(), "panic: static message");

        let err = HandlerError::from_panic(&String::from("owned message"));
        assert_eq!(err.message(), "panic: owned message");

        assert_eq!(HandlerError::from_panic(&42_u32).message(), "panic: unknown panic");
    }

    #[test]
    fn test_parse_error_maps_to_validation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: HandlerError = RequestParseError::from(json_err).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
