//! Test error types.

use kiln_core::RequestParseError;
use thiserror::Error;

/// Errors that can occur while building requests or reading responses.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(#[from] RequestParseError),

    /// Response body reading failed.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TestError::BodyRead("Invalid UTF-8".to_string());
        assert_eq!(err.to_string(), "Body read error: Invalid UTF-8");

        let err = TestError::from(RequestParseError::InvalidMethod("G(T".to_string()));
        assert_eq!(err.to_string(), "Request build error: Invalid request method: G(T");
    }
}
