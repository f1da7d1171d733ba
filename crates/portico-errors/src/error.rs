//! Error types for portico-errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while rendering an error page.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("Failed to read error template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template uses a placeholder that does not exist.
    #[error("Unknown placeholder '{{{{{0}}}}}' in error template")]
    UnknownPlaceholder(String),

    /// A `{{` was never closed.
    #[error("Unclosed placeholder at byte {0} in error template")]
    Unclosed(usize),
}
