//! Outbound response model.

use crate::error::ResponseError;
use crate::headers::Headers;
use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

/// Content type used for plain text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Content type used for HTML bodies.
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Content type used for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// An outbound response.
///
/// The status is validated on construction and on every change: only
/// 100..=599 is accepted. Headers and body can be changed freely until the
/// response is handed back to the transport.
///
/// # Example
///
/// ```
/// use kiln_core::Response;
///
/// let response = Response::json(&serde_json::json!({"id": "42"}))
///     .unwrap()
///     .with_status(201)
///     .unwrap()
///     .with_header("X-Trace", "1");
///
/// assert_eq!(response.status_code(), 201);
/// assert_eq!(response.header("x-trace"), Some("1"));
/// assert!(Response::new(600).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl Response {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Result<Self, ResponseError> {
        Ok(Self::from_status(validate_status(status)?))
    }

    fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    fn with_content(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut response = Self::from_status(status);
        response.headers.insert("Content-Type", content_type);
        response.body = body.into();
        response
    }

    /// Creates an empty `200 OK` response.
    pub fn ok() -> Self {
        Self::from_status(StatusCode::OK)
    }

    /// Creates a `200 OK` plain text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_content(StatusCode::OK, TEXT_PLAIN, content.into())
    }

    /// Creates a `200 OK` HTML response.
    pub fn html(content: impl Into<String>) -> Self {
        Self::with_content(StatusCode::OK, TEXT_HTML, content.into())
    }

    /// Creates a `200 OK` JSON response.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Result<Self, ResponseError> {
        Self::ok().with_json(data)
    }

    /// Creates a redirect: `301` when `permanent`, `302` otherwise.
    pub fn redirect(location: impl Into<String>, permanent: bool) -> Self {
        let status = if permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::FOUND
        };
        let mut response = Self::from_status(status);
        response.headers.insert("Location", location);
        response
    }

    /// Creates a `404` plain text response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_content(StatusCode::NOT_FOUND, TEXT_PLAIN, message.into())
    }

    /// Creates a `400` plain text response.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_content(StatusCode::BAD_REQUEST, TEXT_PLAIN, message.into())
    }

    /// Creates a `401` plain text response.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_content(StatusCode::UNAUTHORIZED, TEXT_PLAIN, message.into())
    }

    /// Creates a `403` plain text response.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_content(StatusCode::FORBIDDEN, TEXT_PLAIN, message.into())
    }

    /// Creates a `500` plain text response.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::with_content(StatusCode::INTERNAL_SERVER_ERROR, TEXT_PLAIN, message.into())
    }

    /// Returns the status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status as an integer.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Changes the status, chaining.
    pub fn with_status(mut self, status: u16) -> Result<Self, ResponseError> {
        self.set_status(status)?;
        Ok(self)
    }

    /// Changes the status in place.
    pub fn set_status(&mut self, status: u16) -> Result<(), ResponseError> {
        self.status = validate_status(status)?;
        Ok(())
    }

    /// Returns the headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the first value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Sets a header, replacing existing values, chaining.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds another value for a header, chaining.
    pub fn append_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns the body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body, chaining.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the body with serialized JSON and sets the content type.
    pub fn with_json<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self, ResponseError> {
        self.body = Bytes::from(serde_json::to_vec(data)?);
        self.headers.insert("Content-Type", APPLICATION_JSON);
        Ok(self)
    }

    /// Splits the response into status, headers and body for a transport.
    pub fn into_parts(self) -> (StatusCode, Headers, Bytes) {
        (self.status, self.headers, self.body)
    }
}

fn validate_status(status: u16) -> Result<StatusCode, ResponseError> {
    if !(100..=599).contains(&status) {
        return Err(ResponseError::InvalidStatus(status));
    }
    StatusCode::from_u16(status).map_err(|_| ResponseError::InvalidStatus(status))
}
