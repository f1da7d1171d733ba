//! Dispatch policies.
//!
//! A policy decides, per request, which collaborator handles it:
//!
//! - [`SplitPolicy`]: the scheme alone picks the branch. The media scheme
//!   goes to the static adapter and the application scheme to the router.
//! - [`LegacyPolicy`]: only the application scheme is served. Paths ending
//!   in the script extension run through the legacy bridge when the file
//!   exists under a static root; everything else goes to the static adapter.

use std::fs::File;
use std::path::{Path, PathBuf};

use portico_core::{IncomingRequest, SchemeResponse};

use crate::static_files::{relative_path, StaticError};

/// Where a request should be delegated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Serve through the static adapter.
    Static,
    /// Dispatch through the path router.
    Router,
    /// Run this script file through the legacy bridge.
    Script(PathBuf),
    /// No collaborator applies; answer 404.
    Unmatched,
}

/// Result of delegating a classified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The collaborator produced a response.
    Found(SchemeResponse),
    /// The collaborator had nothing for this request.
    NotFound,
}

impl From<Option<SchemeResponse>> for DispatchOutcome {
    fn from(response: Option<SchemeResponse>) -> Self {
        response.map_or(Self::NotFound, Self::Found)
    }
}

/// Scheme-based split between static files and the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPolicy {
    app_scheme: String,
    media_scheme: String,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self::new("app", "media")
    }
}

impl SplitPolicy {
    /// Create a split policy.
    pub fn new(app_scheme: impl Into<String>, media_scheme: impl Into<String>) -> Self {
        Self {
            app_scheme: app_scheme.into(),
            media_scheme: media_scheme.into(),
        }
    }

    pub fn app_scheme(&self) -> &str {
        &self.app_scheme
    }

    pub fn media_scheme(&self) -> &str {
        &self.media_scheme
    }

    /// Classify by scheme. Each scheme is checked on its own; neither
    /// matching is `Unmatched`.
    pub fn classify(&self, request: &IncomingRequest) -> Classification {
        let uri = request.uri();
        if uri.has_scheme(&self.media_scheme) {
            Classification::Static
        } else if uri.has_scheme(&self.app_scheme) {
            Classification::Router
        } else {
            Classification::Unmatched
        }
    }
}

/// Script-or-static policy for legacy page scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPolicy {
    app_scheme: String,
    static_dirs: Vec<PathBuf>,
    extension: String,
}

impl LegacyPolicy {
    /// Create a legacy policy that looks for scripts under `static_dirs`.
    pub fn new(static_dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            app_scheme: "app".to_string(),
            static_dirs: static_dirs.into_iter().map(Into::into).collect(),
            extension: "php".to_string(),
        }
    }

    /// Set the only scheme this policy serves.
    pub fn with_app_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.app_scheme = scheme.into();
        self
    }

    /// Set the script extension, with or without a leading dot.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn app_scheme(&self) -> &str {
        &self.app_scheme
    }

    pub fn static_dirs(&self) -> &[PathBuf] {
        &self.static_dirs
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether `path` ends in the script extension, ignoring case. A bare
    /// `/.php` counts.
    pub fn is_script_path(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .is_some_and(|(_, ext)| !ext.contains('/') && ext.eq_ignore_ascii_case(&self.extension))
    }

    /// Classify by scheme, then by path suffix and file existence.
    pub fn classify(&self, request: &IncomingRequest) -> Result<Classification, StaticError> {
        if !request.uri().has_scheme(&self.app_scheme) {
            return Ok(Classification::Unmatched);
        }

        let path = request.path();
        if !self.is_script_path(path) {
            return Ok(Classification::Static);
        }

        Ok(self
            .resolve_script(path)?
            .map_or(Classification::Unmatched, Classification::Script))
    }

    /// Find a readable script file for `path` under the static roots.
    pub fn resolve_script(&self, path: &str) -> Result<Option<PathBuf>, StaticError> {
        let relative = relative_path(path)?;
        Ok(self
            .static_dirs
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| is_readable_file(candidate)))
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

/// The policy a dispatcher runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPolicy {
    Split(SplitPolicy),
    Legacy(LegacyPolicy),
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::Split(SplitPolicy::default())
    }
}

impl DispatchPolicy {
    /// Policy name as used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Split(_) => "split",
            Self::Legacy(_) => "legacy",
        }
    }

    /// Classify a request.
    pub fn classify(&self, request: &IncomingRequest) -> Result<Classification, StaticError> {
        match self {
            Self::Split(policy) => Ok(policy.classify(request)),
            Self::Legacy(policy) => policy.classify(request),
        }
    }
}

impl From<SplitPolicy> for DispatchPolicy {
    fn from(policy: SplitPolicy) -> Self {
        Self::Split(policy)
    }
}

impl From<LegacyPolicy> for DispatchPolicy {
    fn from(policy: LegacyPolicy) -> Self {
        Self::Legacy(policy)
    }
}
