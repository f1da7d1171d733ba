//! Text neutralization for rendered error pages.

use std::path::Path;

/// Replacement shown instead of the install root.
pub const REDACTED_ROOT: &str = "…";

/// Escape text for embedding in HTML element content or attributes.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Hides the application's install root in displayed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRedactor {
    root: Option<String>,
}

impl PathRedactor {
    /// Redact every occurrence of `root`. An empty root redacts nothing.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().display().to_string();
        let root = root.trim_end_matches(['/', '\\']);
        Self {
            root: (!root.is_empty()).then(|| root.to_string()),
        }
    }

    /// A redactor that leaves text alone.
    pub fn none() -> Self {
        Self::default()
    }

    /// The redacted prefix, if any.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Replace the root in `text`.
    pub fn redact(&self, text: &str) -> String {
        match &self.root {
            Some(root) => text.replace(root.as_str(), REDACTED_ROOT),
            None => text.to_string(),
        }
    }
}
