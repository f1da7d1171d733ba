//! The legacy-script bridge.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use portico_core::{IncomingRequest, SchemeResponse};

use crate::ambient::{AmbientContext, AmbientScope};
use crate::capture::CaptureGuard;
use crate::headers::parse_header_lines;
use crate::runner::{CgiRunner, ScriptRunner};
use crate::ScriptError;

type Callable<'a> = Box<dyn FnOnce() -> Result<(), ScriptError> + 'a>;

/// What the bridge executes.
pub enum ScriptTarget<'a> {
    /// A script file, handed to the bridge's runner.
    File(PathBuf),
    /// An in-process callable.
    Callable(Callable<'a>),
}

impl<'a> ScriptTarget<'a> {
    /// A script file target.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// A callable target.
    pub fn callable(f: impl FnOnce() -> Result<(), ScriptError> + 'a) -> Self {
        Self::Callable(Box::new(f))
    }
}

impl fmt::Debug for ScriptTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Runs legacy scripts against an isolated request context.
///
/// Each run installs a context derived from the request, captures whatever
/// the script emits, and restores the previous context before returning,
/// whether the script succeeded or not.
#[derive(Clone)]
pub struct LegacyBridge {
    runner: Arc<dyn ScriptRunner>,
}

impl Default for LegacyBridge {
    fn default() -> Self {
        Self::new(CgiRunner::default())
    }
}

impl fmt::Debug for LegacyBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyBridge").finish_non_exhaustive()
    }
}

impl LegacyBridge {
    /// Create a bridge that runs script files with `runner`.
    pub fn new(runner: impl ScriptRunner + 'static) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    /// Execute `target` for `request`.
    pub fn run(
        &self,
        request: &IncomingRequest,
        target: ScriptTarget<'_>,
    ) -> Result<SchemeResponse, ScriptError> {
        tracing::debug!(script = ?target, path = request.path(), "running legacy script");

        let _scope = AmbientScope::enter(AmbientContext::from_request(request));
        let capture = CaptureGuard::begin();

        match target {
            ScriptTarget::File(path) => {
                if !path.is_file() || std::fs::File::open(&path).is_err() {
                    return Err(ScriptError::not_readable(path));
                }
                self.runner.run_file(&path)?;
            }
            ScriptTarget::Callable(f) => f()?,
        }

        let output = capture.finish();
        let parsed = parse_header_lines(&output.header_lines);
        Ok(SchemeResponse::new(parsed.status, parsed.headers, output.body))
    }
}
