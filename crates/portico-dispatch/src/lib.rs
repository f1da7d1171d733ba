//! Custom-scheme request dispatching for portico.
//!
//! [`SchemeDispatcher`] receives one request from the webview's scheme
//! handler, classifies it with a [`DispatchPolicy`], hands it to exactly one
//! collaborator and always returns a response:
//!
//! - [`StaticAdapter`] / [`DirectoryAdapter`] - file-backed responses
//! - [`PathRouter`] / [`RouteTable`] - application handlers
//! - [`portico_legacy::LegacyBridge`] - legacy page scripts
//!
//! Failures of any of them, including panics, are rendered by the
//! configured [`portico_errors::ErrorTranslator`].

mod config;
mod dispatcher;
mod error;
mod policy;
mod router;
mod static_files;

pub use config::{default_config_template, ConfigError, DispatchConfig, LegacyConfig, PolicyKind};
pub use dispatcher::{DispatcherBuilder, RawSchemeRequest, SchemeDispatcher};
pub use error::DispatchError;
pub use policy::{Classification, DispatchOutcome, DispatchPolicy, LegacyPolicy, SplitPolicy};
pub use router::{Handler, PathRouter, RouteError, RouteParams, RoutePattern, RouteTable};
pub use static_files::{mime_type, relative_path, DirectoryAdapter, StaticAdapter, StaticError, MIME_TYPES};
