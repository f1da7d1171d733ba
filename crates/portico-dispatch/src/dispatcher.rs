//! The scheme dispatcher.
//!
//! One inbound request moves through `Received -> Classifying ->
//! Delegating | Escalating -> Responded`. Every path ends with exactly one
//! response: collaborator failures, "not found" and panics are all turned
//! into an error page by the [`ErrorTranslator`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use portico_core::{CoreError, IncomingRequest, SchemeResponse, SourceLocation, UploadedFile};
use portico_errors::ErrorTranslator;
use portico_legacy::{LegacyBridge, ScriptTarget};
use portico_observability::RequestId;

use crate::config::{ConfigError, DispatchConfig};
use crate::error::DispatchError;
use crate::policy::{Classification, DispatchOutcome, DispatchPolicy};
use crate::router::PathRouter;
use crate::static_files::{DirectoryAdapter, StaticAdapter};

/// The inbound scheme-request event as the native layer delivers it.
#[derive(Debug, Clone, Default)]
pub struct RawSchemeRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub cookies: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub uploads: Vec<(String, UploadedFile)>,
}

impl RawSchemeRequest {
    /// Create an event with no headers or body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Turn the event into a request.
    pub fn into_request(self) -> Result<IncomingRequest, CoreError> {
        let mut builder = IncomingRequest::builder(&self.method, &self.url).body(self.body);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        for (name, value) in self.cookies {
            builder = builder.cookie(name, value);
        }
        for (name, value) in self.query {
            builder = builder.query_param(name, value);
        }
        for (key, file) in self.uploads {
            builder = builder.upload(&key, file);
        }
        builder.build()
    }
}

/// Builds a [`SchemeDispatcher`], checking the policy has what it needs.
#[derive(Default)]
pub struct DispatcherBuilder {
    policy: DispatchPolicy,
    static_adapter: Option<Arc<dyn StaticAdapter>>,
    router: Option<Arc<dyn PathRouter>>,
    bridge: Option<LegacyBridge>,
    translator: Option<ErrorTranslator>,
}

impl DispatcherBuilder {
    /// Create a builder for the split policy with default schemes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: impl Into<DispatchPolicy>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn with_static_adapter(mut self, adapter: impl StaticAdapter + 'static) -> Self {
        self.static_adapter = Some(Arc::new(adapter));
        self
    }

    pub fn with_router(self, router: impl PathRouter + 'static) -> Self {
        self.with_shared_router(Arc::new(router))
    }

    /// Use a router that is shared with other owners.
    pub fn with_shared_router(mut self, router: Arc<dyn PathRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_bridge(mut self, bridge: LegacyBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Set the translator. Defaults to the built-in HTML page.
    pub fn with_translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Build the dispatcher.
    ///
    /// Both policies need a static adapter. The split policy also needs a
    /// router and the legacy policy a bridge.
    pub fn build(self) -> Result<SchemeDispatcher, ConfigError> {
        let policy_name = self.policy.name();
        let missing = |collaborator| ConfigError::MissingCollaborator {
            policy: policy_name,
            collaborator,
        };

        let static_adapter = self.static_adapter.ok_or_else(|| missing("static adapter"))?;
        match self.policy {
            DispatchPolicy::Split(_) if self.router.is_none() => return Err(missing("router")),
            DispatchPolicy::Legacy(_) if self.bridge.is_none() => return Err(missing("bridge")),
            _ => {}
        }

        Ok(SchemeDispatcher {
            policy: self.policy,
            static_adapter,
            router: self.router,
            bridge: self.bridge,
            translator: self.translator.unwrap_or_default(),
        })
    }
}

/// Turns scheme requests into responses. Never fails and never panics
/// outward.
pub struct SchemeDispatcher {
    policy: DispatchPolicy,
    static_adapter: Arc<dyn StaticAdapter>,
    router: Option<Arc<dyn PathRouter>>,
    bridge: Option<LegacyBridge>,
    translator: ErrorTranslator,
}

impl fmt::Debug for SchemeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeDispatcher")
            .field("policy", &self.policy)
            .field("router", &self.router.is_some())
            .field("bridge", &self.bridge)
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}

impl SchemeDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Wire a dispatcher from configuration.
    ///
    /// Static files are served from `static_dirs` by a [`DirectoryAdapter`]
    /// and legacy scripts run through a CGI interpreter. The router is
    /// application code, so it is passed in.
    pub fn from_config(
        config: &DispatchConfig,
        router: Option<Arc<dyn PathRouter>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = DispatcherBuilder::new()
            .with_policy(config.to_policy())
            .with_static_adapter(DirectoryAdapter::new(config.static_dirs.iter().cloned()))
            .with_translator(config.translator());
        if let DispatchPolicy::Legacy(_) = builder.policy {
            builder = builder.with_bridge(LegacyBridge::new(config.cgi_runner()));
        }
        if let Some(router) = router {
            builder = builder.with_shared_router(router);
        }
        builder.build()
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    /// Handle one request. Always returns a response.
    pub fn handle(&self, request: &IncomingRequest) -> SchemeResponse {
        let request_id = RequestId::generate();
        let span = tracing::info_span!(
            "dispatch",
            request_id = %request_id,
            method = %request.method(),
            url = request.uri().as_str(),
            policy = self.policy.name(),
        );
        let _enter = span.enter();
        tracing::debug!(phase = "received");

        let result = catch_panics(|| self.resolve(request));

        let response = match result {
            Ok(response) => response,
            Err(err) => self.escalate(&err),
        };
        tracing::debug!(phase = "responded", status = response.status);
        response
    }

    /// Handle the native inbound event. Malformed events are answered with
    /// an error page like any other failure.
    pub fn handle_raw(&self, raw: RawSchemeRequest) -> SchemeResponse {
        let url = raw.url.clone();
        match raw.into_request() {
            Ok(request) => self.handle(&request),
            Err(err) => {
                let _enter = tracing::info_span!("dispatch", url = url.as_str()).entered();
                self.escalate(&DispatchError::from(err))
            }
        }
    }

    /// Classify and delegate, without escalation.
    pub fn resolve(&self, request: &IncomingRequest) -> Result<SchemeResponse, DispatchError> {
        tracing::debug!(phase = "classifying");
        let classification = self.policy.classify(request)?;

        tracing::debug!(phase = "delegating", ?classification);
        match self.delegate(request, classification)? {
            DispatchOutcome::Found(response) => Ok(response),
            DispatchOutcome::NotFound => Err(DispatchError::not_found(request.uri().as_str())),
        }
    }

    /// Hand a classified request to exactly one collaborator.
    pub fn delegate(
        &self,
        request: &IncomingRequest,
        classification: Classification,
    ) -> Result<DispatchOutcome, DispatchError> {
        match classification {
            Classification::Static => Ok(self.static_adapter.lookup(request)?.into()),
            Classification::Router => {
                let router = self.router.as_ref().ok_or_else(|| self.missing("router"))?;
                Ok(DispatchOutcome::Found(router.dispatch(request)?))
            }
            Classification::Script(path) => {
                let bridge = self.bridge.as_ref().ok_or_else(|| self.missing("bridge"))?;
                Ok(DispatchOutcome::Found(bridge.run(request, ScriptTarget::File(path))?))
            }
            Classification::Unmatched => Ok(DispatchOutcome::NotFound),
        }
    }

    /// Render `err` as an error response.
    pub fn escalate(&self, err: &DispatchError) -> SchemeResponse {
        tracing::debug!(phase = "escalating", error = %err);
        self.translator.translate(&err.to_failure()).into_response()
    }

    fn missing(&self, collaborator: &'static str) -> ConfigError {
        ConfigError::MissingCollaborator {
            policy: self.policy.name(),
            collaborator,
        }
    }
}

thread_local! {
    static PANIC_WINDOW: Cell<bool> = const { Cell::new(false) };
    static PANIC_SITE: RefCell<Option<SourceLocation>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chains a hook in front of the existing one that records where a panic
/// happened, on threads inside a [`catch_panics`] window only.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if PANIC_WINDOW.with(Cell::get) {
                let site = info.location().map(SourceLocation::from);
                PANIC_SITE.with(|slot| *slot.borrow_mut() = site);
            }
            previous(info);
        }));
    });
}

struct PanicWindow {
    was_open: bool,
}

impl PanicWindow {
    fn open() -> Self {
        Self {
            was_open: PANIC_WINDOW.with(|w| w.replace(true)),
        }
    }
}

impl Drop for PanicWindow {
    fn drop(&mut self) {
        PANIC_WINDOW.with(|w| w.set(self.was_open));
    }
}

/// Run `f`, turning a panic into [`DispatchError::Panic`] located where the
/// panic happened.
fn catch_panics<T>(f: impl FnOnce() -> Result<T, DispatchError>) -> Result<T, DispatchError> {
    install_panic_hook();
    let _window = PanicWindow::open();
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let site = PANIC_SITE.with(|slot| slot.borrow_mut().take());
        Err(DispatchError::panic(panic_message(payload.as_ref()), site))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
