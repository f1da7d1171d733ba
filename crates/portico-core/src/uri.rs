//! URIs with arbitrary scheme names.
//!
//! The webview issues requests such as `app://localhost/index.php` or
//! `media://localhost/logo.png`. Each `SchemeUri` carries its own registry of
//! allowed schemes; a scheme that is not already known is registered with the
//! conventional default port on construction, so later structural operations
//! never reject it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use http::uri::{PathAndQuery, Scheme};
use http::Uri;

use crate::CoreError;

/// Port registered for schemes that were not previously known.
pub const DEFAULT_CUSTOM_PORT: u16 = 80;

const STANDARD_SCHEMES: [(&str, u16); 2] = [("http", 80), ("https", 443)];

/// A parsed URI that accepts any scheme name.
#[derive(Debug, Clone)]
pub struct SchemeUri {
    raw: String,
    inner: Uri,
    allowed_schemes: BTreeMap<String, u16>,
}

impl SchemeUri {
    /// Parse a URI string.
    ///
    /// Fails with [`CoreError::MalformedUri`] when the string cannot be parsed
    /// or has no scheme. An unrecognized scheme is never an error.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let inner: Uri = input.parse().map_err(|e: http::uri::InvalidUri| {
            CoreError::MalformedUri {
                uri: input.to_string(),
                reason: e.to_string(),
            }
        })?;

        if inner.scheme_str().is_none() {
            return Err(CoreError::MalformedUri {
                uri: input.to_string(),
                reason: "missing scheme".to_string(),
            });
        }

        let mut uri = Self {
            raw: input.to_string(),
            inner,
            allowed_schemes: STANDARD_SCHEMES
                .iter()
                .map(|(name, port)| (name.to_string(), *port))
                .collect(),
        };
        let scheme = uri.scheme().to_string();
        uri.allow_scheme(&scheme);
        Ok(uri)
    }

    fn allow_scheme(&mut self, scheme: &str) {
        self.allowed_schemes
            .entry(scheme.to_ascii_lowercase())
            .or_insert(DEFAULT_CUSTOM_PORT);
    }

    /// The scheme name, as written.
    pub fn scheme(&self) -> &str {
        self.inner.scheme_str().unwrap_or_default()
    }

    /// Whether the scheme equals `name`, ignoring ASCII case.
    pub fn has_scheme(&self, name: &str) -> bool {
        self.scheme().eq_ignore_ascii_case(name)
    }

    /// The host, or an empty string when the URI has no authority.
    pub fn host(&self) -> &str {
        self.inner.host().unwrap_or_default()
    }

    /// The explicit port, hidden when it equals the scheme's default port.
    pub fn port(&self) -> Option<u16> {
        let port = self.inner.port_u16()?;
        match self.default_port() {
            Some(default) if default == port => None,
            _ => Some(port),
        }
    }

    /// The path component; `/` when the URI has none.
    pub fn path(&self) -> &str {
        match self.inner.path() {
            "" => "/",
            path => path,
        }
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.inner.query()
    }

    /// Whether the scheme is `https`.
    pub fn is_secure(&self) -> bool {
        self.has_scheme("https")
    }

    /// Whether `scheme` is registered on this value.
    pub fn is_allowed(&self, scheme: &str) -> bool {
        self.allowed_schemes
            .contains_key(&scheme.to_ascii_lowercase())
    }

    /// The port registered for this URI's scheme.
    pub fn default_port(&self) -> Option<u16> {
        self.allowed_schemes
            .get(&self.scheme().to_ascii_lowercase())
            .copied()
    }

    /// Return a copy with a different scheme, registering it if needed.
    pub fn with_scheme(&self, scheme: &str) -> Result<Self, CoreError> {
        let mut parts = self.inner.clone().into_parts();
        parts.scheme = Some(Scheme::from_str(scheme).map_err(|e| CoreError::MalformedUri {
            uri: format!("{}://", scheme),
            reason: e.to_string(),
        })?);
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }

        let inner = Uri::from_parts(parts).map_err(|e| CoreError::MalformedUri {
            uri: self.raw.clone(),
            reason: e.to_string(),
        })?;

        let mut uri = Self {
            raw: inner.to_string(),
            inner,
            allowed_schemes: self.allowed_schemes.clone(),
        };
        uri.allow_scheme(scheme);
        Ok(uri)
    }

    /// Return a copy with a different path, keeping the query.
    pub fn with_path(&self, path: &str) -> Result<Self, CoreError> {
        let path_and_query = match self.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };

        let mut parts = self.inner.clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(path_and_query.as_str()).map_err(
            |e| CoreError::MalformedUri {
                uri: path_and_query.clone(),
                reason: e.to_string(),
            },
        )?);

        let inner = Uri::from_parts(parts).map_err(|e| CoreError::MalformedUri {
            uri: self.raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: inner.to_string(),
            inner,
            allowed_schemes: self.allowed_schemes.clone(),
        })
    }

    /// The underlying `http::Uri`.
    pub fn as_http(&self) -> &Uri {
        &self.inner
    }

    /// The URI as it was given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for SchemeUri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SchemeUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for SchemeUri {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SchemeUri {}

#[cfg(test)]
mod tests {
    use super::*;

    // === Parsing Tests ===

    #[test]
    fn test_parse_custom_scheme() {
        let uri = SchemeUri::parse("app://localhost/users/42?tab=posts").unwrap();

        assert_eq!(uri.scheme(), "app");
        assert_eq!(uri.host(), "localhost");
        assert_eq!(uri.path(), "/users/42");
        assert_eq!(uri.query(), Some("tab=posts"));
        assert_eq!(uri.to_string(), "app://localhost/users/42?tab=posts");
    }

    #[test]
    fn test_parse_registers_unseen_scheme() {
        let uri = SchemeUri::parse("media://assets/logo.png").unwrap();

        assert!(uri.is_allowed("media"));
        assert_eq!(uri.default_port(), Some(DEFAULT_CUSTOM_PORT));
        assert!(!uri.is_allowed("app"));
    }

    #[test]
    fn test_parse_standard_scheme_keeps_port() {
        let uri = SchemeUri::parse("https://example.com/").unwrap();

        assert_eq!(uri.default_port(), Some(443));
        assert!(uri.is_secure());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = SchemeUri::parse("app://exa mple/").unwrap_err();
        assert!(matches!(err, CoreError::MalformedUri { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        let err = SchemeUri::parse("/relative/path").unwrap_err();
        assert!(err.to_string().contains("missing scheme"));
    }

    #[test]
    fn test_from_str() {
        let uri: SchemeUri = "app://localhost/".parse().unwrap();
        assert!(uri.has_scheme("APP"));
    }

    // === Independence Tests ===

    #[test]
    fn test_two_schemes_do_not_interfere() {
        let app = SchemeUri::parse("app://localhost/index.php").unwrap();
        let media = SchemeUri::parse("media://localhost/logo.png").unwrap();

        assert!(app.is_allowed("app"));
        assert!(!app.is_allowed("media"));
        assert!(media.is_allowed("media"));
        assert!(!media.is_allowed("app"));
        assert_eq!(app.path(), "/index.php");
        assert_eq!(media.path(), "/logo.png");
    }

    // === Port Tests ===

    #[test]
    fn test_port_hidden_when_default() {
        let uri = SchemeUri::parse("app://localhost:80/").unwrap();
        assert_eq!(uri.port(), None);
    }

    #[test]
    fn test_port_shown_when_non_default() {
        let uri = SchemeUri::parse("app://localhost:8080/").unwrap();
        assert_eq!(uri.port(), Some(8080));
    }

    // === Transformation Tests ===

    #[test]
    fn test_with_scheme_registers_new_scheme() {
        let uri = SchemeUri::parse("app://localhost/a?b=c").unwrap();
        let swapped = uri.with_scheme("media").unwrap();

        assert_eq!(swapped.scheme(), "media");
        assert!(swapped.is_allowed("media"));
        assert!(swapped.is_allowed("app"));
        assert_eq!(swapped.path(), "/a");
        assert_eq!(swapped.query(), Some("b=c"));
        assert!(!uri.is_allowed("media"));
    }

    #[test]
    fn test_with_path_keeps_query() {
        let uri = SchemeUri::parse("app://localhost/a?b=c").unwrap();
        let moved = uri.with_path("/other").unwrap();

        assert_eq!(moved.path(), "/other");
        assert_eq!(moved.query(), Some("b=c"));
    }

    #[test]
    fn test_path_defaults_to_root() {
        let uri = SchemeUri::parse("app://localhost").unwrap();
        assert_eq!(uri.path(), "/");
    }
}
