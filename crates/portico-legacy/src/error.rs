//! Error types for legacy script execution.

use std::panic::Location;
use std::path::PathBuf;
use std::time::Duration;

use portico_core::{Coded, SourceLocation};
use thiserror::Error;

/// Errors raised while a legacy script runs.
///
/// Every variant records where it was raised. Build them through the
/// constructors, or with `?` on an I/O error.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script raised a failure itself.
    #[error("{message}")]
    Raised {
        message: String,
        code: Option<i64>,
        location: &'static Location<'static>,
    },

    /// The interpreter could not be started.
    #[error("Failed to start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
        location: &'static Location<'static>,
    },

    /// Reading or writing the interpreter's streams failed.
    #[error("Script I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        location: &'static Location<'static>,
    },

    /// The script ran past its deadline and was killed.
    #[error("Script timed out after {after:?}")]
    Timeout {
        after: Duration,
        location: &'static Location<'static>,
    },

    /// The interpreter exited unsuccessfully without producing output.
    #[error("Script exited with {status}: {stderr}")]
    Exited {
        status: String,
        stderr: String,
        location: &'static Location<'static>,
    },

    /// The script file is missing or not a readable file.
    #[error("Script not readable: {}", path.display())]
    NotReadable {
        path: PathBuf,
        location: &'static Location<'static>,
    },
}

impl ScriptError {
    /// Raise a failure without a code.
    #[track_caller]
    pub fn raise(message: impl Into<String>) -> Self {
        Self::Raised {
            message: message.into(),
            code: None,
            location: Location::caller(),
        }
    }

    /// Raise a failure carrying a code.
    #[track_caller]
    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self::Raised {
            message: message.into(),
            code: Some(code),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn spawn(interpreter: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            interpreter: interpreter.into(),
            source,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn exited(status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Exited {
            status: status.into(),
            stderr: stderr.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn not_readable(path: impl Into<PathBuf>) -> Self {
        Self::NotReadable {
            path: path.into(),
            location: Location::caller(),
        }
    }

    /// Where the error was raised.
    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Self::Raised { location, .. }
            | Self::Spawn { location, .. }
            | Self::Io { location, .. }
            | Self::Timeout { location, .. }
            | Self::Exited { location, .. }
            | Self::NotReadable { location, .. } => location,
        }
    }
}

impl From<std::io::Error> for ScriptError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: Location::caller(),
        }
    }
}

impl Coded for ScriptError {
    fn code(&self) -> Option<i64> {
        match self {
            Self::Raised { code, .. } => *code,
            Self::Timeout { .. } => Some(504),
            Self::NotReadable { .. } => Some(404),
            Self::Spawn { .. } | Self::Io { .. } | Self::Exited { .. } => None,
        }
    }

    fn raised_at(&self) -> Option<SourceLocation> {
        Some(self.location().into())
    }
}
