//! Observability for portico.
//!
//! This crate provides:
//! - `RequestId` - Identifier attached to each dispatch span
//! - `LogConfig` / `init` - `tracing` subscriber setup (human or JSON)

mod logging;
mod request_id;

pub use logging::*;
pub use request_id::*;
