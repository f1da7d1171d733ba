//! Failure to response translation.

use std::sync::Arc;

use portico_core::{Failure, SchemeResponse};

use crate::template::{ErrorTemplate, HtmlTemplate, TextTemplate, HTML};
use crate::{clamp_status, escape_html, PathRedactor};

/// How much of a failure the rendered page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    /// Message, location, stack context and causes.
    #[default]
    Full,
    /// Message and status only. The full report is still logged.
    Minimal,
}

/// A rendered error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Rendered page.
    pub body: String,
    /// Normalized status.
    pub status: u16,
    /// Content type of `body`.
    pub content_type: &'static str,
}

impl Translation {
    /// Wrap the page in a response.
    pub fn into_response(self) -> SchemeResponse {
        SchemeResponse::ok(self.body)
            .with_status(self.status)
            .with_content_type(self.content_type)
    }
}

/// Converts failures into rendered pages with normalized status codes.
#[derive(Clone)]
pub struct ErrorTranslator {
    template: Arc<dyn ErrorTemplate>,
    redactor: PathRedactor,
    detail: DetailLevel,
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("content_type", &self.template.content_type())
            .field("redactor", &self.redactor)
            .field("detail", &self.detail)
            .finish()
    }
}

impl ErrorTranslator {
    /// Create a translator using the built-in HTML page.
    pub fn new() -> Self {
        Self {
            template: Arc::new(HtmlTemplate),
            redactor: PathRedactor::none(),
            detail: DetailLevel::Full,
        }
    }

    /// Use a different template.
    pub fn with_template(mut self, template: impl ErrorTemplate + 'static) -> Self {
        self.template = Arc::new(template);
        self
    }

    /// Redact `root` from displayed paths.
    pub fn with_install_root(mut self, root: impl AsRef<std::path::Path>) -> Self {
        self.redactor = PathRedactor::new(root);
        self
    }

    /// Set the detail level.
    pub fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }

    /// The detail level.
    pub fn detail(&self) -> DetailLevel {
        self.detail
    }

    /// Render `failure` and compute its status.
    ///
    /// Never fails: a template error falls back to a minimal built-in page.
    pub fn translate(&self, failure: &Failure) -> Translation {
        let status = clamp_status(failure.code());
        self.log(failure, status);

        let minimal;
        let shown = match self.detail {
            DetailLevel::Full => failure,
            DetailLevel::Minimal => {
                minimal = failure.clone().without_details();
                &minimal
            }
        };

        match self.template.render(shown, &self.redactor) {
            Ok(body) => Translation {
                body,
                status,
                content_type: self.template.content_type(),
            },
            Err(err) => {
                tracing::error!(error = %err, "error template failed, using fallback page");
                Translation {
                    body: fallback_body(status, &self.redactor.redact(failure.message())),
                    status,
                    content_type: HTML,
                }
            }
        }
    }

    fn log(&self, failure: &Failure, status: u16) {
        let report = TextTemplate
            .render(failure, &self.redactor)
            .unwrap_or_else(|err| err.to_string());
        if status >= 500 {
            tracing::error!(status, kind = ?failure.kind(), "{}", report);
        } else {
            tracing::warn!(status, kind = ?failure.kind(), "{}", report);
        }
    }
}

/// The page used when the configured template cannot render.
pub fn fallback_body(status: u16, message: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"UTF-8\"><title>Error {status}</title></head>\n\
         <body><h1>Error {status}</h1><p>{}</p></body>\n</html>\n",
        escape_html(message)
    )
}
