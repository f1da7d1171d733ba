//! Path-based routing for the application scheme.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;
use portico_core::{Coded, IncomingRequest, SchemeResponse, SourceLocation};
use thiserror::Error;

/// Parameters captured from `:name` and `*name` segments.
pub type RouteParams = IndexMap<String, String>;

/// Errors raised by a router or a route handler.
///
/// Each variant records where it was raised, so the error page points at
/// the handler rather than at the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No route matches the path.
    #[error("No route for {method} {path}")]
    NotFound {
        method: String,
        path: String,
        location: &'static Location<'static>,
    },

    /// A route matches the path but not the method.
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        location: &'static Location<'static>,
    },

    /// The handler failed.
    #[error("{message}")]
    Handler {
        message: String,
        code: Option<i64>,
        location: &'static Location<'static>,
    },
}

impl RouteError {
    #[track_caller]
    pub fn not_found(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            method: method.into(),
            path: path.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn method_not_allowed(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            path: path.into(),
            location: Location::caller(),
        }
    }

    /// A handler failure carrying a code.
    #[track_caller]
    pub fn handler(message: impl Into<String>, code: i64) -> Self {
        Self::Handler {
            message: message.into(),
            code: Some(code),
            location: Location::caller(),
        }
    }

    /// A handler failure without a code. Rendered as 500.
    #[track_caller]
    pub fn raise(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            code: None,
            location: Location::caller(),
        }
    }

    /// Where the error was raised.
    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Self::NotFound { location, .. }
            | Self::MethodNotAllowed { location, .. }
            | Self::Handler { location, .. } => location,
        }
    }
}

impl Coded for RouteError {
    fn code(&self) -> Option<i64> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::MethodNotAllowed { .. } => Some(405),
            Self::Handler { code, .. } => *code,
        }
    }

    fn raised_at(&self) -> Option<SourceLocation> {
        Some(self.location().into())
    }
}

/// Resolves an application-scheme request to a handler response.
pub trait PathRouter: Send + Sync {
    /// Dispatch the request. Raises [`RouteError::NotFound`] when nothing
    /// matches.
    fn dispatch(&self, request: &IncomingRequest) -> Result<SchemeResponse, RouteError>;
}

/// A route handler.
pub type Handler =
    Arc<dyn Fn(&IncomingRequest, &RouteParams) -> Result<SchemeResponse, RouteError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    Rest(String),
}

/// A parsed route pattern such as `/users/:id` or `/files/*path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern. Segments after a `*name` segment are ignored.
    pub fn parse(pattern: &str) -> Self {
        let mut segments = Vec::new();
        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = part.strip_prefix(':') {
                segments.push(Segment::Param(name.to_string()));
            } else if let Some(name) = part.strip_prefix('*') {
                segments.push(Segment::Rest(name.to_string()));
                break;
            } else {
                segments.push(Segment::Static(part.to_string()));
            }
        }

        Self {
            source: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a path, returning captured parameters.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = RouteParams::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Rest(name) => {
                    params.insert(name.clone(), parts.get(i..).unwrap_or_default().join("/"));
                    return Some(params);
                }
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*parts.get(i)?).to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Route {
    method: Option<Method>,
    pattern: RoutePattern,
    handler: Handler,
}

/// A method and pattern route table. Routes are tried in insertion order.
#[derive(Default, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| {
                format!(
                    "{} {}",
                    r.method.as_ref().map(Method::as_str).unwrap_or("*"),
                    r.pattern
                )
            }))
            .finish()
    }
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. `method` of `None` matches every method.
    pub fn route<F>(mut self, method: Option<Method>, pattern: &str, handler: F) -> Self
    where
        F: Fn(&IncomingRequest, &RouteParams) -> Result<SchemeResponse, RouteError>
            + Send
            + Sync
            + 'static,
    {
        self.routes.push(Arc::new(Route {
            method,
            pattern: RoutePattern::parse(pattern),
            handler: Arc::new(handler),
        }));
        self
    }

    /// Add a GET route.
    pub fn get<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&IncomingRequest, &RouteParams) -> Result<SchemeResponse, RouteError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Some(Method::GET), pattern, handler)
    }

    /// Add a POST route.
    pub fn post<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&IncomingRequest, &RouteParams) -> Result<SchemeResponse, RouteError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Some(Method::POST), pattern, handler)
    }

    /// Add a route for every method.
    pub fn any<F>(self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&IncomingRequest, &RouteParams) -> Result<SchemeResponse, RouteError>
            + Send
            + Sync
            + 'static,
    {
        self.route(None, pattern, handler)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl PathRouter for RouteTable {
    fn dispatch(&self, request: &IncomingRequest) -> Result<SchemeResponse, RouteError> {
        let path = request.path();
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            path_matched = true;

            if route.method.as_ref().map_or(true, |m| m == request.method()) {
                tracing::debug!(pattern = %route.pattern, "route matched");
                return (route.handler)(request, &params);
            }
        }

        let method = request.method().as_str();
        if path_matched {
            Err(RouteError::method_not_allowed(method, path))
        } else {
            Err(RouteError::not_found(method, path))
        }
    }
}
