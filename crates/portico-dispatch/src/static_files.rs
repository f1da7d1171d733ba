//! Static file resolution.

use std::panic::Location;
use std::path::{Component, Path, PathBuf};

use http::header::CONTENT_LENGTH;
use http::{HeaderValue, Method};
use portico_core::{Coded, IncomingRequest, SchemeResponse, SourceLocation};
use thiserror::Error;

/// MIME types for static file serving.
pub const MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("txt", "text/plain; charset=utf-8"),
    ("xml", "application/xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("svg", "image/svg+xml"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

/// Get the MIME type for a file based on its extension.
pub fn mime_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|ext| {
            MIME_TYPES
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(ext))
                .map(|(_, v)| *v)
        })
        .unwrap_or("application/octet-stream")
}

/// Errors raised by a static adapter.
#[derive(Error, Debug)]
pub enum StaticError {
    /// The path tries to leave the static roots.
    #[error("Forbidden path: {path}")]
    Forbidden {
        path: String,
        location: &'static Location<'static>,
    },

    /// The file exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: &'static Location<'static>,
    },
}

impl StaticError {
    #[track_caller]
    pub fn forbidden(path: impl Into<String>) -> Self {
        Self::Forbidden {
            path: path.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
            location: Location::caller(),
        }
    }
}

impl Coded for StaticError {
    fn code(&self) -> Option<i64> {
        match self {
            Self::Forbidden { .. } => Some(403),
            Self::Io { .. } => None,
        }
    }

    fn raised_at(&self) -> Option<SourceLocation> {
        match self {
            Self::Forbidden { location, .. } | Self::Io { location, .. } => {
                Some((*location).into())
            }
        }
    }
}

/// Resolves a request to a file-backed response.
pub trait StaticAdapter: Send + Sync {
    /// Look up the request. `Ok(None)` means nothing matched.
    fn lookup(&self, request: &IncomingRequest) -> Result<Option<SchemeResponse>, StaticError>;
}

/// Serves files from a list of root directories, first match wins.
///
/// Only the URI path is mapped under the roots; the host is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryAdapter {
    roots: Vec<PathBuf>,
    index_file: String,
}

impl DirectoryAdapter {
    /// Create an adapter over `roots`.
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            index_file: "index.html".to_string(),
        }
    }

    /// File served for directory paths.
    pub fn with_index_file(mut self, name: impl Into<String>) -> Self {
        self.index_file = name.into();
        self
    }

    /// The root directories.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Find the file `path` names, if it exists under a root.
    pub fn resolve(&self, path: &str) -> Result<Option<PathBuf>, StaticError> {
        let relative = relative_path(path)?;
        for root in &self.roots {
            let mut candidate = root.join(&relative);
            if candidate.is_dir() {
                candidate.push(&self.index_file);
            }
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

impl StaticAdapter for DirectoryAdapter {
    fn lookup(&self, request: &IncomingRequest) -> Result<Option<SchemeResponse>, StaticError> {
        let Some(file) = self.resolve(request.path())? else {
            return Ok(None);
        };

        let bytes = std::fs::read(&file).map_err(|source| StaticError::io(&file, source))?;
        tracing::debug!(file = %file.display(), size = bytes.len(), "serving static file");

        let mut response = SchemeResponse::ok(Vec::new()).with_content_type(mime_type(&file));
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        if request.method() != Method::HEAD {
            response.body = bytes;
        }
        Ok(Some(response))
    }
}

/// Turn a URI path into a path relative to a root.
///
/// Any `..` segment is rejected rather than normalized.
pub fn relative_path(path: &str) -> Result<PathBuf, StaticError> {
    let relative = Path::new(path.trim_start_matches('/'));
    let mut out = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StaticError::forbidden(path));
            }
        }
    }
    Ok(out)
}
