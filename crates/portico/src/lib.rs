//! # Portico
//!
//! Request dispatching for the custom URI schemes an embedded webview
//! issues (`app://`, `media://`, ...). Every request comes back as a
//! response: static files, router handlers and legacy page scripts are
//! delegated to, and any failure becomes a rendered error page.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portico::prelude::*;
//!
//! let router = RouteTable::new()
//!     .get("/users/:id", |_, params| {
//!         Ok(SchemeResponse::ok(format!("user {}", params["id"])))
//!     });
//!
//! let dispatcher = SchemeDispatcher::builder()
//!     .with_policy(SplitPolicy::new("app", "media"))
//!     .with_static_adapter(DirectoryAdapter::new(["public"]))
//!     .with_router(router)
//!     .build()?;
//!
//! // From the webview's scheme handler:
//! let response = dispatcher.handle_raw(RawSchemeRequest::new("GET", "app://main/users/42"));
//! let http_response = response.into_http();
//! ```
//!
//! ## Crates
//!
//! - [`portico_core`] - scheme URIs, requests, responses, failures
//! - [`portico_legacy`] - ambient request context and the legacy script bridge
//! - [`portico_errors`] - error templates and the failure translator
//! - [`portico_dispatch`] - policies, collaborators and the dispatcher
//! - [`portico_observability`] - log setup and request ids

pub mod prelude;

pub use portico_core;
pub use portico_dispatch;
pub use portico_errors;
pub use portico_legacy;
pub use portico_observability;

pub use portico_core::{Failure, IncomingRequest, SchemeResponse, SchemeUri};
pub use portico_dispatch::{DispatchConfig, RawSchemeRequest, SchemeDispatcher};
pub use portico_errors::ErrorTranslator;
pub use portico_legacy::LegacyBridge;
