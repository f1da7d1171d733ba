//! End-to-end dispatch scenarios across the core, legacy, errors and
//! dispatch crates.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use portico_core::{IncomingRequest, SchemeResponse, UploadStatus, UploadedFile};
use portico_dispatch::{
    DirectoryAdapter, DispatchConfig, LegacyPolicy, PolicyKind, RouteError, RouteTable,
    SchemeDispatcher, SplitPolicy,
};
use portico_errors::{DetailLevel, ErrorTranslator, FileTemplate};
use portico_legacy::{ambient, capture, FileDescriptor, LegacyBridge, ScriptError, ScriptRunner};

/// Runs script files in-process: the file's first line is the header to
/// emit and the rest is echoed.
struct InlineRunner;

impl ScriptRunner for InlineRunner {
    fn run_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = fs::read_to_string(path)?;
        let (header, body) = source.split_once('\n').unwrap_or(("", source.as_str()));
        if !header.is_empty() {
            capture::header(header);
        }
        capture::echo(body);
        Ok(())
    }
}

/// Lists the uploads it sees in the ambient context.
struct UploadRunner;

impl ScriptRunner for UploadRunner {
    fn run_file(&self, _: &Path) -> Result<(), ScriptError> {
        let files = ambient::files(&["files"]).ok_or_else(|| ScriptError::with_code("no files", 400))?;
        for file in files.files() {
            capture::echo(format!(
                "{}|{}|{}|{}|{}\n",
                file.name, file.media_type, file.size, file.tmp_name, file.error
            ));
        }
        Ok(())
    }
}

/// Raises a coded failure.
struct RaisingRunner(i64);

impl ScriptRunner for RaisingRunner {
    fn run_file(&self, _: &Path) -> Result<(), ScriptError> {
        capture::echo("partial output");
        Err(ScriptError::with_code("script refused", self.0))
    }
}

fn media_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("logo.png"), b"\x89PNG\r\n").unwrap();
    dir
}

fn legacy_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.php"), "Content-Type: text/html\nOK").unwrap();
    fs::write(dir.path().join("upload.php"), "").unwrap();
    fs::write(dir.path().join("app.css"), "body{}").unwrap();
    dir
}

fn split_dispatcher(root: &Path, router: RouteTable) -> SchemeDispatcher {
    SchemeDispatcher::builder()
        .with_policy(SplitPolicy::default())
        .with_static_adapter(DirectoryAdapter::new([root]))
        .with_router(router)
        .build()
        .unwrap()
}

fn legacy_dispatcher(root: &Path, runner: impl ScriptRunner + 'static) -> SchemeDispatcher {
    SchemeDispatcher::builder()
        .with_policy(LegacyPolicy::new([root]))
        .with_static_adapter(DirectoryAdapter::new([root]))
        .with_bridge(LegacyBridge::new(runner))
        .build()
        .unwrap()
}

fn get(url: &str) -> IncomingRequest {
    IncomingRequest::get(url).unwrap()
}

// === Split Policy ===

#[test]
fn test_media_file_present() {
    let dir = media_fixture();
    let dispatcher = split_dispatcher(dir.path(), RouteTable::new());

    let resp = dispatcher.handle(&get("media://assets/logo.png"));

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"\x89PNG\r\n");
    assert_eq!(resp.content_type(), Some("image/png"));
}

#[test]
fn test_media_file_absent() {
    let dir = media_fixture();
    let dispatcher = split_dispatcher(dir.path(), RouteTable::new());

    let resp = dispatcher.handle(&get("media://assets/missing.png"));

    assert_eq!(resp.status, 404);
    assert!(resp.text().contains("Not Found"));
    assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
}

#[test]
fn test_router_miss_leaves_ambient_untouched() {
    let dir = media_fixture();
    let router = RouteTable::new().get("/profile", |_, _| Ok(SchemeResponse::ok("me")));
    let dispatcher = split_dispatcher(dir.path(), router);
    let before = ambient::snapshot();

    let resp = dispatcher.handle(&get("app://users/42"));

    assert_eq!(resp.status, 404);
    assert!(resp.text().contains("No route for GET /42"));
    assert_eq!(ambient::snapshot(), before);
    assert_eq!(ambient::depth(), 0);
}

#[test]
fn test_router_code_kept_in_band() {
    let dir = media_fixture();
    let router = RouteTable::new()
        .get("/admin", |_, _| Err(RouteError::handler("Forbidden", 403)))
        .get("/odd", |_, _| Err(RouteError::handler("Odd code", 999)))
        .get("/zero", |_, _| Err(RouteError::handler("Zero code", 0)));
    let dispatcher = split_dispatcher(dir.path(), router);

    assert_eq!(dispatcher.handle(&get("app://x/admin")).status, 403);
    assert_eq!(dispatcher.handle(&get("app://x/odd")).status, 500);
    assert_eq!(dispatcher.handle(&get("app://x/zero")).status, 500);
}

#[test]
fn test_error_page_escapes_markup() {
    let dir = media_fixture();
    let router = RouteTable::new().get("/xss", |_, _| {
        Err(RouteError::handler("<script>alert(1)</script>", 422))
    });
    let dispatcher = split_dispatcher(dir.path(), router);

    let resp = dispatcher.handle(&get("app://x/xss"));

    assert_eq!(resp.status, 422);
    assert!(!resp.text().contains("<script>alert(1)</script>"));
    assert!(resp.text().contains("&lt;script&gt;"));
}

// === Legacy Policy ===

#[test]
fn test_legacy_script_runs() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), InlineRunner);

    let resp = dispatcher.handle(&get("app://admin/index.php"));

    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("content-type"), Some("text/html"));
    assert_eq!(resp.text(), "OK");
    assert_eq!(ambient::depth(), 0);
}

#[test]
fn test_legacy_missing_script_is_404() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), InlineRunner);

    let resp = dispatcher.handle(&get("app://admin/missing.PHP"));
    assert_eq!(resp.status, 404);
}

#[test]
fn test_legacy_other_scheme_is_404() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), InlineRunner);

    assert_eq!(dispatcher.handle(&get("media://admin/index.php")).status, 404);
}

#[test]
fn test_legacy_non_script_served_static() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), InlineRunner);

    let resp = dispatcher.handle(&get("app://admin/app.css"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("text/css"));
    assert_eq!(resp.text(), "body{}");
}

#[test]
fn test_legacy_traversal_forbidden() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), InlineRunner);

    assert_eq!(dispatcher.handle(&get("app://admin/../index.php")).status, 403);
}

#[test]
fn test_legacy_failure_restores_ambient() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), RaisingRunner(409));
    let before = ambient::snapshot();

    let resp = dispatcher.handle(&get("app://admin/index.php?x=1"));

    assert_eq!(resp.status, 409);
    assert!(resp.text().contains("script refused"));
    assert!(!resp.text().contains("partial output"));
    assert_eq!(ambient::snapshot(), before);
    assert_eq!(ambient::depth(), 0);
}

#[test]
fn test_nested_uploads_flattened() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), UploadRunner);
    let request = IncomingRequest::builder("POST", "app://admin/upload.php")
        .upload(
            "files[0][avatar]",
            UploadedFile::new("/tmp/php1")
                .with_filename("a.png")
                .with_media_type("image/png")
                .with_size(10),
        )
        .upload(
            "files[1][avatar]",
            UploadedFile::new("/tmp/php2")
                .with_filename("b.jpg")
                .with_media_type("image/jpeg")
                .with_size(20)
                .with_status(UploadStatus::Partial),
        )
        .build()
        .unwrap();

    let resp = dispatcher.handle(&request);

    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.text(),
        "a.png|image/png|10|/tmp/php1|0\nb.jpg|image/jpeg|20|/tmp/php2|3\n"
    );
}

#[test]
fn test_upload_descriptor_fields() {
    let file = UploadedFile::new("/tmp/x")
        .with_filename("doc.pdf")
        .with_media_type("application/pdf")
        .with_size(5);
    let descriptor = FileDescriptor::from(&file);
    assert_eq!(descriptor.name, "doc.pdf");
    assert_eq!(descriptor.media_type, "application/pdf");
    assert_eq!(descriptor.size, 5);
    assert_eq!(descriptor.tmp_name, "/tmp/x");
    assert_eq!(descriptor.error, 0);
}

// === Failure Locations ===

fn page_location(resp: &SchemeResponse) -> String {
    let text = resp.text();
    let start = text.find("Error location:").expect("page shows a location");
    let end = text[start..].find("</p>").map_or(text.len(), |e| start + e);
    text[start..end].to_string()
}

#[test]
fn test_router_failure_points_at_handler() {
    let dir = media_fixture();
    let router = RouteTable::new().get("/admin", |_, _| Err(RouteError::handler("boom", 403)));
    let dispatcher = split_dispatcher(dir.path(), router);

    let location = page_location(&dispatcher.handle(&get("app://x/admin")));

    assert!(location.contains("scenarios.rs"), "{location}");
    assert!(!location.contains("dispatcher.rs"), "{location}");
}

#[test]
fn test_script_failure_points_at_runner() {
    let dir = legacy_fixture();
    let dispatcher = legacy_dispatcher(dir.path(), RaisingRunner(409));

    let location = page_location(&dispatcher.handle(&get("app://x/index.php")));

    assert!(location.contains("scenarios.rs"), "{location}");
}

#[test]
fn test_traversal_failure_points_at_static_files() {
    let dir = media_fixture();
    let dispatcher = split_dispatcher(dir.path(), RouteTable::new());

    let location = page_location(&dispatcher.handle(&get("media://x/../secret")));

    assert!(location.contains("static_files.rs"), "{location}");
}

// === Error Rendering ===

#[test]
fn test_broken_template_falls_back() {
    let dir = media_fixture();
    let dispatcher = SchemeDispatcher::builder()
        .with_static_adapter(DirectoryAdapter::new([dir.path()]))
        .with_router(RouteTable::new())
        .with_translator(
            ErrorTranslator::new().with_template(FileTemplate::new(dir.path().join("nope.html"))),
        )
        .build()
        .unwrap();

    let resp = dispatcher.handle(&get("media://x/missing.png"));

    assert_eq!(resp.status, 404);
    assert!(resp.text().contains("Error 404"));
    assert!(resp.text().contains("Not Found"));
}

#[test]
fn test_file_template_used() {
    let dir = media_fixture();
    let template = dir.path().join("error.txt");
    fs::write(&template, "{{status}}: {{message}}").unwrap();
    let dispatcher = SchemeDispatcher::builder()
        .with_static_adapter(DirectoryAdapter::new([dir.path()]))
        .with_router(RouteTable::new())
        .with_translator(ErrorTranslator::new().with_template(FileTemplate::new(&template)))
        .build()
        .unwrap();

    let resp = dispatcher.handle(&get("media://x/missing.png"));

    assert_eq!(resp.text(), "404: Not Found: media://x/missing.png");
    assert_eq!(resp.content_type(), Some("text/plain; charset=utf-8"));
}

#[test]
fn test_install_root_redacted() {
    let dir = legacy_fixture();
    let root = dir.path().to_path_buf();
    let dispatcher = SchemeDispatcher::builder()
        .with_policy(LegacyPolicy::new([&root]))
        .with_static_adapter(DirectoryAdapter::new([&root]))
        .with_bridge(LegacyBridge::new(FailingReadRunner))
        .with_translator(
            ErrorTranslator::new()
                .with_install_root(&root)
                .with_detail(DetailLevel::Minimal),
        )
        .build()
        .unwrap();

    let resp = dispatcher.handle(&get("app://x/index.php"));

    assert_eq!(resp.status, 500);
    assert!(!resp.text().contains(root.to_str().unwrap()));
}

/// Fails with a message that names the script path.
struct FailingReadRunner;

impl ScriptRunner for FailingReadRunner {
    fn run_file(&self, path: &Path) -> Result<(), ScriptError> {
        Err(ScriptError::raise(format!("cannot parse {}", path.display())))
    }
}

// === Configuration ===

#[test]
fn test_from_config_split() {
    let dir = media_fixture();
    let config = DispatchConfig {
        static_dirs: vec![dir.path().to_path_buf()],
        ..Default::default()
    };
    let router: Arc<dyn portico_dispatch::PathRouter> =
        Arc::new(RouteTable::new().get("/", |_, _| Ok(SchemeResponse::ok("home"))));

    let dispatcher = SchemeDispatcher::from_config(&config, Some(router)).unwrap();

    assert_eq!(dispatcher.handle(&get("app://main/")).text(), "home");
    assert_eq!(dispatcher.handle(&get("media://x/logo.png")).status, 200);
}

#[test]
fn test_from_config_split_without_router_fails() {
    let config = DispatchConfig::default();
    assert!(SchemeDispatcher::from_config(&config, None).is_err());
}

#[test]
fn test_from_config_hides_details() {
    let dir = media_fixture();
    let config = DispatchConfig {
        static_dirs: vec![dir.path().to_path_buf()],
        show_error_details: false,
        ..Default::default()
    };
    let dispatcher = SchemeDispatcher::from_config(&config, Some(Arc::new(RouteTable::new()))).unwrap();

    let resp = dispatcher.handle(&get("app://x/nothing"));
    assert_eq!(resp.status, 404);
    assert!(!resp.text().contains("Error location"));
}

#[cfg(unix)]
mod cgi {
    use super::*;

    fn cgi_config(root: PathBuf) -> DispatchConfig {
        let mut config = DispatchConfig {
            policy: PolicyKind::Legacy,
            static_dirs: vec![root],
            ..Default::default()
        };
        config.legacy.interpreter = PathBuf::from("/bin/sh");
        config.legacy.timeout_ms = Some(5_000);
        config
    }

    #[test]
    fn test_cgi_script_runs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index.php"),
            "printf 'Content-Type: text/html\\r\\n\\r\\nOK'\n",
        )
        .unwrap();
        let dispatcher =
            SchemeDispatcher::from_config(&cgi_config(dir.path().to_path_buf()), None).unwrap();

        let resp = dispatcher.handle(&get("app://admin/index.php"));

        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.text(), "OK");
    }

    #[test]
    fn test_cgi_status_header() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("gone.php"),
            "printf 'Status: 410 Gone\\r\\nContent-Type: text/plain\\r\\n\\r\\nbye'\n",
        )
        .unwrap();
        let dispatcher =
            SchemeDispatcher::from_config(&cgi_config(dir.path().to_path_buf()), None).unwrap();

        let resp = dispatcher.handle(&get("app://x/gone.php"));

        assert_eq!(resp.status, 410);
        assert_eq!(resp.text(), "bye");
    }
}
