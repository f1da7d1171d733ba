//! Failure rendering for portico.
//!
//! [`ErrorTranslator`] turns any [`portico_core::Failure`] into a rendered
//! page plus a status clamped into the error band. Pages are produced by an
//! [`ErrorTemplate`]: the built-in [`HtmlTemplate`], the plain
//! [`TextTemplate`] report, or a user [`FileTemplate`].

mod error;
mod escape;
mod status;
mod template;
mod translator;

pub use error::RenderError;
pub use escape::{escape_html, PathRedactor, REDACTED_ROOT};
pub use status::{clamp_status, DEFAULT_ERROR_STATUS, ERROR_BAND};
pub use template::{ErrorTemplate, FileTemplate, HtmlTemplate, TextTemplate, HTML, PLACEHOLDERS, TEXT};
pub use translator::{fallback_body, DetailLevel, ErrorTranslator, Translation};
