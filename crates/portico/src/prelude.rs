//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use portico::prelude::*;
//! ```

// Value types
pub use portico_core::{
    Coded, CoreError, Failure, FailureKind, IncomingRequest, SchemeResponse, SchemeUri,
    UploadStatus, UploadTree, UploadedFile,
};

// Legacy scripts
pub use portico_legacy::{
    ambient, capture, AmbientContext, AmbientScope, CgiRunner, FileDescriptor, LegacyBridge,
    ScriptError, ScriptRunner, ScriptTarget,
};

// Error pages
pub use portico_errors::{
    DetailLevel, ErrorTemplate, ErrorTranslator, FileTemplate, HtmlTemplate, TextTemplate,
};

// Dispatching
pub use portico_dispatch::{
    Classification, DirectoryAdapter, DispatchConfig, DispatchError, DispatchOutcome,
    DispatchPolicy, LegacyPolicy, PathRouter, RawSchemeRequest, RouteError, RouteParams,
    RouteTable, SchemeDispatcher, SplitPolicy, StaticAdapter,
};

// Observability
pub use portico_observability::{LogConfig, LogFormat, LogLevel, RequestId};
