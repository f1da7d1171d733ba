//! Error types for dispatching.

use std::panic::Location;

use portico_core::{Coded, CoreError, Failure, FailureKind, SourceLocation};
use portico_legacy::ScriptError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::router::RouteError;
use crate::static_files::StaticError;

/// Errors raised while dispatching one scheme request.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No collaborator could resolve the request.
    #[error("Not Found: {url}")]
    NotFound {
        url: String,
        location: &'static Location<'static>,
    },

    /// The static adapter raised.
    #[error(transparent)]
    Static(#[from] StaticError),

    /// The path router or a route handler raised.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// A legacy script raised.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The inbound event could not be turned into a request.
    #[error("Invalid request: {0}")]
    Request(#[from] CoreError),

    /// A delegate panicked.
    #[error("Handler panicked: {message}")]
    Panic {
        message: String,
        location: Option<SourceLocation>,
    },

    /// The dispatcher was misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DispatchError {
    /// Create a "not found" error for a URL.
    #[track_caller]
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound {
            url: url.into(),
            location: Location::caller(),
        }
    }

    /// A delegate panicked at `location`, when the panic hook saw it.
    pub fn panic(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::Panic {
            message: message.into(),
            location,
        }
    }

    /// The failure kind shown on the error page.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. }
            | Self::Route(RouteError::NotFound { .. })
            | Self::Script(ScriptError::NotReadable { .. }) => FailureKind::NotFound,
            Self::Static(_) | Self::Route(_) | Self::Script(_) => FailureKind::Delegate,
            Self::Panic { .. } => FailureKind::Panic,
            Self::Request(_) | Self::Config(_) => FailureKind::Other,
        }
    }

    /// Turn the error into a renderable failure, located where the error
    /// was raised.
    #[track_caller]
    pub fn to_failure(&self) -> Failure {
        Failure::from_coded(self.failure_kind(), self)
    }
}

impl Coded for DispatchError {
    fn code(&self) -> Option<i64> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Static(e) => e.code(),
            Self::Route(e) => e.code(),
            Self::Script(e) => e.code(),
            Self::Request(e) => e.code(),
            Self::Panic { .. } | Self::Config(_) => None,
        }
    }

    fn raised_at(&self) -> Option<SourceLocation> {
        match self {
            Self::NotFound { location, .. } => Some((*location).into()),
            Self::Static(e) => e.raised_at(),
            Self::Route(e) => e.raised_at(),
            Self::Script(e) => e.raised_at(),
            Self::Panic { location, .. } => location.clone(),
            Self::Request(_) | Self::Config(_) => None,
        }
    }
}
