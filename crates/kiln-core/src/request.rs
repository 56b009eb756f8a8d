//! Inbound request model.

use crate::attributes::Attributes;
use crate::error::RequestParseError;
use crate::headers::Headers;
use crate::params::Params;
use bytes::Bytes;
use http::Method;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A normalized inbound request.
///
/// Transport adapters construct one `Request` per inbound call. The kernel
/// then hands it to lifecycle hooks, middleware and finally the route handler.
/// Stages mutate it in place; the [`Attributes`] bag is shared by all clones
/// and never replaced.
///
/// # Example
///
/// ```
/// use kiln_core::Request;
///
/// let request = Request::builder()
///     .method("post")
///     .url("/search?q=kiln+docs&page=2")
///     .header("Content-Type", "application/json; charset=utf-8")
///     .body(r#"{"limit": 5}"#)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.method(), "POST");
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.query("q"), Some("kiln docs"));
/// assert_eq!(request.content_type(), Some("application/json".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Headers,
    body: Bytes,
    path_params: Params,
    attributes: Attributes,
}

impl Request {
    /// Creates a request without headers or body.
    ///
    /// `url` may carry a query string, which is decoded into query parameters.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_pairs(query)),
            None => (url.clone(), Vec::new()),
        };

        Self {
            method,
            url,
            path,
            query,
            headers: Headers::new(),
            body: Bytes::new(),
            path_params: Params::new(),
            attributes: Attributes::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Starts building a request from transport primitives.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Returns the uppercased request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full request target, including any query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the path component used for routing.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rewrites the path used for routing.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request headers for modification.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the first value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Adds a header, chaining.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns the raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body, chaining.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns a query parameter. When a name repeats the last value wins.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value of a repeated query parameter.
    pub fn query_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the query parameters as a map using last-wins semantics.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query.iter().cloned().collect()
    }

    /// Returns a parameter captured from the route pattern.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name)
    }

    /// Returns every parameter captured from the route pattern.
    pub fn path_params(&self) -> &Params {
        &self.path_params
    }

    /// Sets the captured route parameters.
    pub fn set_path_params(&mut self, params: Params) {
        self.path_params = params;
    }

    /// Returns the shared attribute bag.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the media type of the body, lowercased and without parameters.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<&str, RequestParseError> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestParseError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> Result<HashMap<String, String>, RequestParseError> {
        let text = self.text()?;
        let mut fields = HashMap::new();
        for pair in text.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = decode_component(name)
                .ok_or_else(|| RequestParseError::Form(format!("invalid field name `{name}`")))?;
            let value = decode_component(value).ok_or_else(|| {
                RequestParseError::Form(format!("invalid value for field `{name}`"))
            })?;
            fields.insert(name, value);
        }
        Ok(fields)
    }
}

/// Builder assembling a [`Request`] from transport primitives.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    url: Option<String>,
    headers: Headers,
    body: Bytes,
}

impl RequestBuilder {
    /// Sets the method. Any casing is accepted.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the request target (path plus optional query string).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends several headers in order.
    pub fn headers<N, V>(mut self, headers: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the request. Defaults to `GET /`.
    pub fn build(self) -> Result<Request, RequestParseError> {
        let method = match self.method {
            Some(method) => Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| RequestParseError::InvalidMethod(method))?,
            None => Method::GET,
        };

        let mut request = Request::new(method, self.url.unwrap_or_else(|| "/".to_string()));
        request.headers = self.headers;
        request.body = self.body;
        Ok(request)
    }
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                decode_component(name).unwrap_or_else(|| name.to_string()),
                decode_component(value).unwrap_or_else(|| value.to_string()),
            )
        })
        .collect()
}

fn decode_component(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(std::borrow::Cow::into_owned)
}
