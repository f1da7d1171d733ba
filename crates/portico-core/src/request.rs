//! Inbound scheme requests.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, Method};
use indexmap::IndexMap;

use crate::{CoreError, SchemeUri, UploadTree, UploadedFile};

/// Ordered string parameters (query, parsed body, cookies, server params).
pub type Params = IndexMap<String, String>;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A request issued by the webview against a custom scheme.
///
/// Immutable once built; construct with [`IncomingRequest::builder`].
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    uri: SchemeUri,
    headers: HeaderMap,
    query: Params,
    body: Vec<u8>,
    parsed_body: Option<Params>,
    cookies: Params,
    uploads: UploadTree<UploadedFile>,
    server_params: Params,
}

impl IncomingRequest {
    /// Start building a request.
    pub fn builder(method: &str, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Shorthand for a bodiless GET request.
    pub fn get(url: &str) -> Result<Self, CoreError> {
        Self::builder("GET", url).build()
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URI.
    pub fn uri(&self) -> &SchemeUri {
        &self.uri
    }

    /// The target URI path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// All headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Query parameters.
    pub fn query_params(&self) -> &Params {
        &self.query
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parsed form body, when the body is form-encoded.
    pub fn parsed_body(&self) -> Option<&Params> {
        self.parsed_body.as_ref()
    }

    /// Cookies.
    pub fn cookies(&self) -> &Params {
        &self.cookies
    }

    /// Uploaded files.
    pub fn uploads(&self) -> &UploadTree<UploadedFile> {
        &self.uploads
    }

    /// Extra server parameters supplied by the host.
    pub fn server_params(&self) -> &Params {
        &self.server_params
    }
}

/// Builder for [`IncomingRequest`].
///
/// Errors are deferred until [`RequestBuilder::build`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: String,
    url: String,
    headers: HeaderMap,
    query: Option<Params>,
    body: Vec<u8>,
    form: Option<Params>,
    cookies: Params,
    uploads: UploadTree<UploadedFile>,
    server_params: Params,
    error: Option<CoreError>,
}

impl RequestBuilder {
    /// Create a new builder.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HeaderMap::new(),
            query: None,
            body: Vec::new(),
            form: None,
            cookies: Params::new(),
            uploads: UploadTree::new(),
            server_params: Params::new(),
            error: None,
        }
    }

    /// Append a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|n| {
                HeaderValue::from_str(value)
                    .map(|v| (n, v))
                    .map_err(|e| e.to_string())
            });
        match parsed {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(reason) => {
                self.error = Some(CoreError::InvalidHeader {
                    name: name.to_string(),
                    reason,
                });
            }
        }
        self
    }

    /// Set the raw body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a query parameter explicitly; disables parsing the URI query.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(Params::new)
            .insert(name.into(), value.into());
        self
    }

    /// Set a parsed form field; disables parsing the raw body.
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(Params::new)
            .insert(name.into(), value.into());
        self
    }

    /// Set a cookie; disables parsing the `Cookie` header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Attach an uploaded file under a (possibly bracketed) form key.
    pub fn upload(mut self, key: &str, file: UploadedFile) -> Self {
        self.uploads.insert_path(key, file);
        self
    }

    /// Set an extra server parameter.
    pub fn server_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_params.insert(name.into(), value.into());
        self
    }

    /// Build the request.
    pub fn build(self) -> Result<IncomingRequest, CoreError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| CoreError::InvalidMethod(self.method.clone()))?;
        let uri = SchemeUri::parse(&self.url)?;

        let query = match self.query {
            Some(query) => query,
            None => uri.query().map(parse_form).unwrap_or_default(),
        };

        let cookies = if self.cookies.is_empty() {
            parse_cookie_headers(&self.headers)
        } else {
            self.cookies
        };

        let parsed_body = match self.form {
            Some(form) => Some(form),
            None if is_form_encoded(&self.headers) => {
                Some(parse_form(&String::from_utf8_lossy(&self.body)))
            }
            None => None,
        };

        Ok(IncomingRequest {
            method,
            uri,
            headers: self.headers,
            query,
            body: self.body,
            parsed_body,
            cookies,
            uploads: self.uploads,
            server_params: self.server_params,
        })
    }
}

/// Parse an `application/x-www-form-urlencoded` string. Later keys win.
pub fn parse_form(input: &str) -> Params {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

fn parse_cookie_headers(headers: &HeaderMap) -> Params {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase().starts_with(FORM_URLENCODED))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let req = IncomingRequest::builder("POST", "app://localhost/save?id=7")
            .header("Content-Type", "text/plain")
            .body("hello")
            .build()
            .unwrap();

        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.path(), "/save");
        assert_eq!(req.query_params().get("id").map(String::as_str), Some("7"));
        assert_eq!(req.body(), b"hello");
        assert!(req.parsed_body().is_none());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = IncomingRequest::builder("GET", "app://localhost/")
            .header("X-Requested-With", "portico")
            .build()
            .unwrap();

        assert_eq!(req.header("x-requested-with"), Some("portico"));
    }

    #[test]
    fn test_headers_accumulate() {
        let req = IncomingRequest::builder("GET", "app://localhost/")
            .header("Accept", "text/html")
            .header("accept", "application/json")
            .build()
            .unwrap();

        let values: Vec<_> = req.headers().get_all("accept").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_invalid_header_deferred_to_build() {
        let err = IncomingRequest::builder("GET", "app://localhost/")
            .header("Bad Header", "x")
            .build()
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidHeader { .. }));
    }

    #[test]
    fn test_invalid_method() {
        let err = IncomingRequest::builder("GE T", "app://localhost/")
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidMethod(_)));
    }

    #[test]
    fn test_malformed_url() {
        let err = IncomingRequest::get("no scheme here").unwrap_err();
        assert!(matches!(err, CoreError::MalformedUri { .. }));
    }

    #[test]
    fn test_explicit_query_overrides_uri() {
        let req = IncomingRequest::builder("GET", "app://localhost/?a=1")
            .query_param("b", "2")
            .build()
            .unwrap();

        assert!(req.query_params().get("a").is_none());
        assert_eq!(req.query_params().get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_query_decoding() {
        let req = IncomingRequest::get("app://localhost/?name=J%C3%BCrgen+M").unwrap();
        assert_eq!(
            req.query_params().get("name").map(String::as_str),
            Some("Jürgen M")
        );
    }

    #[test]
    fn test_cookie_header_parsed() {
        let req = IncomingRequest::builder("GET", "app://localhost/")
            .header("Cookie", "session=abc; theme=dark")
            .build()
            .unwrap();

        assert_eq!(req.cookies().get("session").map(String::as_str), Some("abc"));
        assert_eq!(req.cookies().get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_explicit_cookies_win() {
        let req = IncomingRequest::builder("GET", "app://localhost/")
            .header("Cookie", "session=abc")
            .cookie("other", "1")
            .build()
            .unwrap();

        assert!(req.cookies().get("session").is_none());
        assert_eq!(req.cookies().len(), 1);
    }

    #[test]
    fn test_form_body_parsed() {
        let req = IncomingRequest::builder("POST", "app://localhost/login")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .body("user=admin&pass=s%26cret")
            .build()
            .unwrap();

        let form = req.parsed_body().unwrap();
        assert_eq!(form.get("user").map(String::as_str), Some("admin"));
        assert_eq!(form.get("pass").map(String::as_str), Some("s&cret"));
    }

    #[test]
    fn test_explicit_form_fields() {
        let req = IncomingRequest::builder("POST", "app://localhost/")
            .form_field("a", "1")
            .build()
            .unwrap();

        assert_eq!(req.parsed_body().unwrap().get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_uploads_attached() {
        let req = IncomingRequest::builder("POST", "app://localhost/")
            .upload("files[0][avatar]", UploadedFile::new("/tmp/a"))
            .build()
            .unwrap();

        assert!(req.uploads().get(&["files", "0", "avatar"]).is_some());
    }
}
