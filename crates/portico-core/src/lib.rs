//! Core types for custom-scheme webview dispatch.
//!
//! This crate provides the value types every other portico crate shares:
//! - `SchemeUri` - URIs with arbitrary scheme names (`app://`, `media://`)
//! - `IncomingRequest` - The request the webview issued
//! - `SchemeResponse` - The response handed back to the webview
//! - `UploadTree` / `UploadedFile` - Uploaded files keyed by form name
//! - `Failure` - A renderable failure with its chain of causes

mod error;
mod failure;
mod request;
mod response;
mod upload;
mod uri;

pub use error::*;
pub use failure::*;
pub use request::*;
pub use response::*;
pub use upload::*;
pub use uri::*;
