//! Outgoing scheme responses.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

/// A response handed back to the webview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body.
    pub body: Vec<u8>,
}

impl SchemeResponse {
    /// Create a new response.
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, HeaderMap::new(), body)
    }

    /// An HTML response with the given status.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::ok(body.into()).with_status(status).with_content_type("text/html; charset=utf-8")
    }

    /// Set the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set `Content-Type`, replacing any previous value.
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// Replace a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Some((name, value)) = header_pair(name, value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append a header value. Invalid names or values are ignored.
    pub fn append_header(mut self, name: &str, value: &str) -> Self {
        if let Some((name, value)) = header_pair(name, value) {
            self.headers.append(name, value);
        }
        self
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response was a client error (4xx status).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response was a server error (5xx status).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// First value of a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value of a header, in order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// The `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert into an `http::Response` for a webview protocol handler.
    ///
    /// A status outside what `http` accepts becomes 500.
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *response.headers_mut() = self.headers;
        response
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = HeaderValue::from_str(value).ok()?;
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(status: u16, body: &[u8]) -> SchemeResponse {
        SchemeResponse::new(status, HeaderMap::new(), body.to_vec())
    }

    // === Status Check Tests ===

    #[test]
    fn test_response_is_success() {
        assert!(make_response(200, b"").is_success());
        assert!(make_response(299, b"").is_success());
        assert!(!make_response(199, b"").is_success());
        assert!(!make_response(300, b"").is_success());
    }

    #[test]
    fn test_response_is_client_error() {
        assert!(make_response(404, b"").is_client_error());
        assert!(!make_response(500, b"").is_client_error());
    }

    #[test]
    fn test_response_is_server_error() {
        assert!(make_response(503, b"").is_server_error());
        assert!(!make_response(499, b"").is_server_error());
    }

    // === Header Tests ===

    #[test]
    fn test_response_header_case_insensitive() {
        let resp = make_response(200, b"").with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn test_response_append_header() {
        let resp = make_response(200, b"")
            .append_header("Set-Cookie", "a=1")
            .append_header("Set-Cookie", "b=2");

        assert_eq!(resp.header_values("set-cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_response_with_header_replaces() {
        let resp = make_response(200, b"")
            .append_header("X-Mode", "a")
            .with_header("X-Mode", "b");

        assert_eq!(resp.header_values("x-mode"), vec!["b"]);
    }

    #[test]
    fn test_response_invalid_header_ignored() {
        let resp = make_response(200, b"").with_header("Bad Name", "x");
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_response_html() {
        let resp = SchemeResponse::html(404, "<h1>Not Found</h1>");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(resp.text(), "<h1>Not Found</h1>");
    }

    // === Conversion Tests ===

    #[test]
    fn test_into_http() {
        let resp = SchemeResponse::ok("OK").with_header("Content-Type", "text/plain");
        let http = resp.into_http();

        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers()["content-type"], "text/plain");
        assert_eq!(http.body(), b"OK");
    }

    #[test]
    fn test_into_http_invalid_status() {
        let http = make_response(42, b"").into_http();
        assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
