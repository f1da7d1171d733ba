//! The ambient request context read by legacy scripts.
//!
//! Legacy scripts do not receive the request as a parameter. They read it
//! from an implicit "current request" instead. Here that context lives in a
//! thread-local slot, so concurrent requests on different threads never see
//! each other's state. [`AmbientScope`] swaps a context in and puts the
//! previous one back when dropped, on every exit path including unwinding.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

use indexmap::IndexMap;
use portico_core::{IncomingRequest, Params, UploadTree, UploadedFile};

/// A flattened upload record, as legacy scripts expect it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Client filename, empty when not sent.
    pub name: String,
    /// Client media type, empty when not sent.
    pub media_type: String,
    /// Size in bytes, zero when unknown.
    pub size: u64,
    /// Temporary storage path, empty when the upload has none.
    pub tmp_name: String,
    /// Numeric upload status.
    pub error: u8,
}

impl From<&UploadedFile> for FileDescriptor {
    fn from(file: &UploadedFile) -> Self {
        Self {
            name: file.client_filename.clone().unwrap_or_default(),
            media_type: file.client_media_type.clone().unwrap_or_default(),
            size: file.size.unwrap_or(0),
            tmp_name: file
                .temp_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            error: file.status.code(),
        }
    }
}

/// The state a legacy script sees as "the current request".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientContext {
    /// Server variables (`REQUEST_METHOD`, `HTTP_HOST`, ...).
    pub server: Params,
    /// Query parameters.
    pub get: Params,
    /// Parsed body fields.
    pub post: Params,
    /// Cookies.
    pub cookie: Params,
    /// Query, body and cookie values merged, later sources winning.
    pub request: Params,
    /// Uploads, keyed by top-level form name.
    pub files: UploadTree<FileDescriptor>,
    /// Raw request body.
    pub input: Vec<u8>,
}

impl AmbientContext {
    /// Derive a context from a request.
    pub fn from_request(request: &IncomingRequest) -> Self {
        let get = request.query_params().clone();
        let post = request.parsed_body().cloned().unwrap_or_default();
        let cookie = request.cookies().clone();

        let mut merged = get.clone();
        merged.extend(post.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(cookie.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            server: server_vars(request),
            get,
            post,
            cookie,
            request: merged,
            files: request
                .uploads()
                .map(&|file: &UploadedFile| FileDescriptor::from(file)),
            input: request.body().to_vec(),
        }
    }
}

fn server_vars(request: &IncomingRequest) -> Params {
    let uri = request.uri();
    let mut server = request.server_params().clone();

    server.insert("REQUEST_METHOD".into(), request.method().to_string());
    server.insert("REQUEST_URI".into(), uri.path().to_string());
    server.insert(
        "QUERY_STRING".into(),
        uri.query().unwrap_or_default().to_string(),
    );
    server.insert("HTTP_HOST".into(), uri.host().to_string());
    server.insert("REQUEST_SCHEME".into(), uri.scheme().to_string());
    server.insert(
        "HTTPS".into(),
        if uri.is_secure() { "on" } else { "off" }.to_string(),
    );

    let mut headers: IndexMap<String, Vec<&str>> = IndexMap::new();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            headers
                .entry(header_var(name.as_str()))
                .or_default()
                .push(value);
        }
    }
    for (key, values) in headers {
        server.insert(key, values.join(", "));
    }

    server
}

/// `x-requested-with` -> `HTTP_X_REQUESTED_WITH`.
fn header_var(name: &str) -> String {
    format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_"))
}

thread_local! {
    static CURRENT: RefCell<AmbientContext> = RefCell::new(AmbientContext::default());
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// An open mutation window on this thread's ambient context.
///
/// The previous context is restored when the scope is dropped. Scopes must
/// be dropped in reverse order of entry, which ordinary lexical scoping
/// guarantees.
#[must_use = "the context is restored as soon as the scope is dropped"]
pub struct AmbientScope {
    previous: Option<AmbientContext>,
    // Restoration must happen on the thread that entered the scope.
    _not_send: PhantomData<*const ()>,
}

impl AmbientScope {
    /// Install `context` as the current context.
    pub fn enter(context: AmbientContext) -> Self {
        let previous = CURRENT.with(|slot| slot.replace(context));
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        tracing::trace!(depth = depth(), "ambient context entered");
        Self {
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }
}

impl Drop for AmbientScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT.with(|slot| slot.replace(previous));
            DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
            tracing::trace!(depth = depth(), "ambient context restored");
        }
    }
}

/// Read the current context.
///
/// Calling [`with_mut`] from inside `f` panics.
pub fn with<R>(f: impl FnOnce(&AmbientContext) -> R) -> R {
    CURRENT.with_borrow(f)
}

/// Mutate the current context in place.
pub fn with_mut<R>(f: impl FnOnce(&mut AmbientContext) -> R) -> R {
    CURRENT.with_borrow_mut(f)
}

/// Clone the current context.
pub fn snapshot() -> AmbientContext {
    with(Clone::clone)
}

/// Number of open scopes on this thread.
pub fn depth() -> usize {
    DEPTH.with(Cell::get)
}

/// A server variable.
pub fn server(name: &str) -> Option<String> {
    with(|ctx| ctx.server.get(name).cloned())
}

/// A query parameter.
pub fn query(name: &str) -> Option<String> {
    with(|ctx| ctx.get.get(name).cloned())
}

/// A parsed body field.
pub fn post(name: &str) -> Option<String> {
    with(|ctx| ctx.post.get(name).cloned())
}

/// A cookie.
pub fn cookie(name: &str) -> Option<String> {
    with(|ctx| ctx.cookie.get(name).cloned())
}

/// A value from the merged query, body and cookie map.
pub fn request(name: &str) -> Option<String> {
    with(|ctx| ctx.request.get(name).cloned())
}

/// The upload subtree at `path`.
pub fn files(path: &[&str]) -> Option<UploadTree<FileDescriptor>> {
    with(|ctx| ctx.files.get(path).cloned())
}

/// The raw request body.
pub fn input() -> Vec<u8> {
    with(|ctx| ctx.input.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::UploadStatus;

    fn sample_request() -> IncomingRequest {
        IncomingRequest::builder("POST", "app://localhost/admin/index.php?page=2&id=1")
            .header("X-Requested-With", "portico")
            .header("Accept", "text/html")
            .header("Accept", "application/json")
            .header("Cookie", "id=cookie")
            .form_field("id", "form")
            .body("id=form")
            .server_param("DOCUMENT_ROOT", "/srv")
            .server_param("REQUEST_METHOD", "OVERRIDDEN")
            .build()
            .unwrap()
    }

    // === Derivation Tests ===

    #[test]
    fn test_server_vars() {
        let ctx = AmbientContext::from_request(&sample_request());

        assert_eq!(ctx.server["REQUEST_METHOD"], "POST");
        assert_eq!(ctx.server["REQUEST_URI"], "/admin/index.php");
        assert_eq!(ctx.server["QUERY_STRING"], "page=2&id=1");
        assert_eq!(ctx.server["HTTP_HOST"], "localhost");
        assert_eq!(ctx.server["REQUEST_SCHEME"], "app");
        assert_eq!(ctx.server["HTTPS"], "off");
        assert_eq!(ctx.server["DOCUMENT_ROOT"], "/srv");
    }

    #[test]
    fn test_header_vars_joined() {
        let ctx = AmbientContext::from_request(&sample_request());

        assert_eq!(ctx.server["HTTP_X_REQUESTED_WITH"], "portico");
        assert_eq!(ctx.server["HTTP_ACCEPT"], "text/html, application/json");
    }

    #[test]
    fn test_https_on_for_secure_scheme() {
        let req = IncomingRequest::get("https://example.com/").unwrap();
        let ctx = AmbientContext::from_request(&req);
        assert_eq!(ctx.server["HTTPS"], "on");
    }

    #[test]
    fn test_request_merge_precedence() {
        let ctx = AmbientContext::from_request(&sample_request());

        assert_eq!(ctx.get["id"], "1");
        assert_eq!(ctx.post["id"], "form");
        assert_eq!(ctx.request["id"], "cookie");
        assert_eq!(ctx.request["page"], "2");
        assert_eq!(ctx.input, b"id=form");
    }

    #[test]
    fn test_nested_uploads_normalized() {
        let req = IncomingRequest::builder("POST", "app://localhost/upload.php")
            .upload(
                "files[0][avatar]",
                UploadedFile::new("/tmp/php1")
                    .with_filename("a.png")
                    .with_media_type("image/png")
                    .with_size(12),
            )
            .upload(
                "files[1][avatar]",
                UploadedFile::new("/tmp/php2")
                    .with_filename("b.jpg")
                    .with_media_type("image/jpeg")
                    .with_size(34)
                    .with_status(UploadStatus::Partial),
            )
            .build()
            .unwrap();

        let ctx = AmbientContext::from_request(&req);
        let flat: Vec<&FileDescriptor> = ctx.files.files().collect();

        assert_eq!(
            flat,
            vec![
                &FileDescriptor {
                    name: "a.png".into(),
                    media_type: "image/png".into(),
                    size: 12,
                    tmp_name: "/tmp/php1".into(),
                    error: 0,
                },
                &FileDescriptor {
                    name: "b.jpg".into(),
                    media_type: "image/jpeg".into(),
                    size: 34,
                    tmp_name: "/tmp/php2".into(),
                    error: 3,
                },
            ]
        );
        assert!(ctx.files.get(&["files", "1", "avatar"]).is_some());
    }

    // === Scope Tests ===

    #[test]
    fn test_scope_restores_previous() {
        let before = snapshot();
        {
            let _scope = AmbientScope::enter(AmbientContext::from_request(&sample_request()));
            assert_eq!(server("REQUEST_METHOD").as_deref(), Some("POST"));
            assert_eq!(query("page").as_deref(), Some("2"));
            assert_eq!(depth(), 1);
        }
        assert_eq!(snapshot(), before);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_nested_scopes_restore_in_order() {
        let outer_req = IncomingRequest::get("app://localhost/outer").unwrap();
        let inner_req = IncomingRequest::get("app://localhost/inner").unwrap();

        let outer = AmbientScope::enter(AmbientContext::from_request(&outer_req));
        {
            let _inner = AmbientScope::enter(AmbientContext::from_request(&inner_req));
            assert_eq!(server("REQUEST_URI").as_deref(), Some("/inner"));
            assert_eq!(depth(), 2);
        }
        assert_eq!(server("REQUEST_URI").as_deref(), Some("/outer"));
        drop(outer);
        assert_eq!(server("REQUEST_URI"), None);
    }

    #[test]
    fn test_scope_restores_after_panic() {
        let before = snapshot();
        let result = std::panic::catch_unwind(|| {
            let _scope = AmbientScope::enter(AmbientContext::from_request(&sample_request()));
            with_mut(|ctx| ctx.get.insert("tampered".into(), "yes".into()));
            panic!("script blew up");
        });

        assert!(result.is_err());
        assert_eq!(snapshot(), before);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_accessors() {
        let _scope = AmbientScope::enter(AmbientContext::from_request(&sample_request()));
        assert_eq!(post("id").as_deref(), Some("form"));
        assert_eq!(cookie("id").as_deref(), Some("cookie"));
        assert_eq!(request("id").as_deref(), Some("cookie"));
        assert_eq!(input(), b"id=form".to_vec());
        assert!(files(&["missing"]).is_none());
    }
}
