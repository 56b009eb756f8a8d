//! Test client for in-memory request testing.

use crate::error::TestError;
use crate::response::TestResponse;
use bytes::Bytes;
use http::Method;
use kiln_core::{BoxFuture, Request, Response, APPLICATION_JSON};
use kiln_kernel::Kernel;
use std::future::Future;
use std::sync::Arc;

/// Handler function type for the test client.
pub type TestHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// A client that sends requests straight into a handler or kernel.
///
/// # Example
///
/// ```
/// use kiln_core::Response;
/// use kiln_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let client = TestClient::new(|request| async move {
///     Response::text(format!("{} {}", request.method(), request.path()))
/// });
///
/// let response = client.post("/items").send().await;
/// assert_eq!(response.text().unwrap(), "POST /items");
/// # });
/// ```
#[must_use]
pub struct TestClient {
    handler: TestHandler,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a test client from a handler function.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler: TestHandler = Arc::new(move |request: Request| -> BoxFuture<'static, Response> {
            Box::pin(handler(request))
        });
        Self {
            handler,
            default_headers: Vec::new(),
        }
    }

    /// Creates a test client driving a kernel's full pipeline.
    pub fn from_kernel(kernel: Arc<Kernel>) -> Self {
        Self::new(move |request| {
            let kernel = Arc::clone(&kernel);
            async move { kernel.handle(request).await }
        })
    }

    /// Creates a test client that echoes the method and path as JSON.
    pub fn echo() -> Self {
        Self::new(|request| async move {
            let body = serde_json::json!({
                "method": request.method().as_str(),
                "path": request.path(),
            });
            Response::ok()
                .with_header("Content-Type", APPLICATION_JSON)
                .with_body(body.to_string())
        })
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::GET, path)
    }

    /// Creates a POST request builder.
    pub fn post(&self, path: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::POST, path)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, path: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::PUT, path)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, path: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, path)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, path: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, path)
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, path: impl Into<String>) -> TestClientRequest<'_> {
        TestClientRequest {
            client: self,
            method,
            path: path.into(),
            query: Vec::new(),
            headers: self.default_headers.clone(),
            body: Bytes::new(),
            error: None,
        }
    }

    /// Sends an already built request.
    pub async fn send_request(&self, request: Request) -> TestResponse {
        let response = (self.handler)(request).await;
        TestResponse::from_response(response)
    }
}

/// A request builder bound to a test client.
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Bytes,
    error: Option<TestError>,
}

impl<'a> TestClientRequest<'a> {
    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header("Authorization", value)
    }

    /// Appends a query parameter. Names and values are percent-encoded.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the request body as JSON and the matching Content-Type.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = Bytes::from(body);
                self.header("Content-Type", APPLICATION_JSON)
            }
            Err(e) => {
                self.error = Some(TestError::Json(e));
                self
            }
        }
    }

    /// Builds the request without sending it.
    pub fn build(self) -> Result<Request, TestError> {
        self.into_parts().map(|(_, request)| request)
    }

    /// Sends the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built; use
    /// [`try_send`](Self::try_send) to handle that case.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("failed to build test request: {e}"),
        }
    }

    /// Sends the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let (client, request) = self.into_parts()?;
        Ok(client.send_request(request).await)
    }

    fn into_parts(self) -> Result<(&'a TestClient, Request), TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut url = self.path;
        if !self.query.is_empty() {
            let query = self
                .query
                .iter()
                .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
                .collect::<Vec<_>>()
                .join("&");
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }

        let request = Request::builder()
            .method(self.method.as_str())
            .url(url)
            .headers(self.headers)
            .body(self.body)
            .build()?;
        Ok((self.client, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inspect() -> TestClient {
        TestClient::new(|request| async move {
            let body = json!({
                "method": request.method().as_str(),
                "path": request.path(),
                "q": request.query("q"),
                "auth": request.header("authorization"),
                "custom": request.header("x-custom"),
                "content_type": request.content_type(),
                "body": request.text().unwrap_or_default(),
            });
            Response::json(&body).unwrap_or_else(|_| Response::server_error("encode"))
        })
    }

    #[tokio::test]
    async fn test_echo_client() {
        let client = TestClient::echo();
        let response = client.get("/test/path").send().await;

        assert_eq!(response.status_code(), 200);
        let json: serde_json::Value = response.json().unwrap();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["path"], "/test/path");
    }

    #[tokio::test]
    async fn test_all_methods() {
        let client = TestClient::echo();

        for (method, response) in [
            ("GET", client.get("/m").send().await),
            ("POST", client.post("/m").send().await),
            ("PUT", client.put("/m").send().await),
            ("PATCH", client.patch("/m").send().await),
            ("DELETE", client.delete("/m").send().await),
            ("OPTIONS", client.request(Method::OPTIONS, "/m").send().await),
        ] {
            assert_eq!(response.json_value().unwrap()["method"], method);
        }
    }

    #[tokio::test]
    async fn test_headers_query_and_json() {
        let client = inspect().with_default_header("X-Custom", "default-value");

        let response = client
            .post("/search")
            .query("q", "rust & tokio")
            .bearer_token("my_token")
            .json(&json!({"name": "Alice"}))
            .send()
            .await;

        let body = response.json_value().unwrap();
        assert_eq!(body["path"], "/search");
        assert_eq!(body["q"], "rust & tokio");
        assert_eq!(body["auth"], "Bearer my_token");
        assert_eq!(body["custom"], "default-value");
        assert_eq!(body["content_type"], "application/json");
        assert_eq!(body["body"], r#"{"name":"Alice"}"#);
    }

    #[test]
    fn test_extension_method() {
        let client = TestClient::echo();
        let method = Method::from_bytes(b"BREW").unwrap();

        let request = client.request(method, "/pot").build().unwrap();
        assert_eq!(request.method().as_str(), "BREW");
    }

    #[test]
    fn test_build_keeps_existing_query() {
        let client = TestClient::echo();
        let request = client.get("/items?page=2").query("sort", "name").build().unwrap();

        assert_eq!(request.query("page"), Some("2"));
        assert_eq!(request.query("sort"), Some("name"));
        assert_eq!(request.path(), "/items");
    }
}
