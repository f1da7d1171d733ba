//! Error types for portico-core.

use thiserror::Error;

use crate::SourceLocation;

/// Errors raised while building requests and responses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The URI string could not be parsed.
    #[error("Malformed URI '{uri}': {reason}")]
    MalformedUri { uri: String, reason: String },

    /// Unknown or invalid HTTP method.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Header name or value rejected by the header map.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl Coded for CoreError {
    fn code(&self) -> Option<i64> {
        Some(400)
    }
}

/// An error that carries a numeric, HTTP-like code.
///
/// Dispatch failures use the code to pick the response status; codes outside
/// the error band are replaced by 500 when the failure is rendered.
pub trait Coded: std::error::Error {
    /// The failure code, if the error has one.
    fn code(&self) -> Option<i64> {
        None
    }

    /// Where the error was raised, when it recorded that itself.
    fn raised_at(&self) -> Option<SourceLocation> {
        None
    }
}
