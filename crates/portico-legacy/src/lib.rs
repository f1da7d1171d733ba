//! Legacy page-script execution for portico.
//!
//! Legacy scripts read "the current request" from ambient state and write
//! their response as loose header lines plus body output. This crate gives
//! them that model without leaking state between requests:
//!
//! - [`ambient`] - the thread-local request context and its restore guard
//! - [`capture`] - scoped output capture (`echo`, `header`, ...)
//! - [`LegacyBridge`] - runs one script and turns its output into a
//!   [`portico_core::SchemeResponse`]
//! - [`CgiRunner`] - executes script files through a CGI interpreter

pub mod ambient;
mod bridge;
pub mod capture;
mod error;
mod headers;
mod runner;

pub use ambient::{AmbientContext, AmbientScope, FileDescriptor};
pub use bridge::{LegacyBridge, ScriptTarget};
pub use capture::{CaptureGuard, CapturedOutput, OutputWriter};
pub use error::ScriptError;
pub use headers::{parse_header_lines, status_code, ParsedHeaders, DEFAULT_STATUS};
pub use runner::{CgiRunner, ScriptRunner};
