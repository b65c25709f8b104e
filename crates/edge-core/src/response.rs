//! Immutable HTTP response.

use bytes::Bytes;
use http::StatusCode;

use crate::error::Result;
use crate::headers::{names, Headers};

/// An HTTP response.
///
/// A constructed response is read-only: middlewares that need different
/// headers build a new response over the same body with
/// [`Response::with_headers`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, Headers::new(), body)
    }

    /// A bodiless response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Headers::new(), Bytes::new())
    }

    /// The `404 Not Found` response used for unmatched originless routes.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, Headers::new(), "Not Found")
    }

    /// A redirect to `location` with the given status.
    pub fn redirect(location: &str, status: StatusCode) -> Result<Self> {
        let headers = Headers::new().set(names::LOCATION, location)?;
        Ok(Self::new(status, headers, Bytes::new()))
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name)
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// A new response with the same status and body but other headers.
    pub fn with_headers(&self, headers: Headers) -> Self {
        Self {
            status: self.status,
            headers,
            body: self.body.clone(),
        }
    }

    /// Check if the status is a client or server error (>= 400).
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp = Response::ok("ok");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text(), "ok");
        assert!(resp.headers().is_empty());
        assert!(!resp.is_error());
    }

    #[test]
    fn test_not_found() {
        let resp = Response::not_found();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.text(), "Not Found");
        assert!(resp.is_error());
    }

    #[test]
    fn test_redirect_sets_location() {
        let resp = Response::redirect("https://example.com/next", StatusCode::FOUND).unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.header("Location"), Some("https://example.com/next".to_string()));
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_with_headers_shares_body() {
        let original = Response::ok("shared");
        let headers = original.headers().set("X-New", "1").unwrap();
        let copy = original.with_headers(headers);

        assert_eq!(copy.body(), original.body());
        assert_eq!(copy.header("x-new"), Some("1".to_string()));
        assert_eq!(original.header("x-new"), None);
    }
}
