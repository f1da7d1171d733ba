//! Error page templates.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use portico_core::Failure;

use crate::{clamp_status, escape_html, PathRedactor, RenderError};

/// HTML content type.
pub const HTML: &str = "text/html; charset=utf-8";

/// Plain text content type.
pub const TEXT: &str = "text/plain; charset=utf-8";

/// Renders a failure and its causes into a page.
pub trait ErrorTemplate: Send + Sync {
    /// Render the page.
    fn render(&self, failure: &Failure, redactor: &PathRedactor) -> Result<String, RenderError>;

    /// Content type of the rendered page.
    fn content_type(&self) -> &'static str {
        HTML
    }
}

/// The built-in HTML error page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTemplate;

const STYLE: &str = r#"
:root { color-scheme: light dark; }
body { font-family: sans-serif; }
h1 { color: red; font-size: 2em; padding-bottom: 0.25em; border-bottom: thick double firebrick; }
h2 { font-size: 1.5em; font-weight: normal; }
h2.previous { font-size: 1.25em; color: slategray; }
h3 { font-size: 1.25em; font-weight: normal; }
span.badge { background-color: orangered; color: white; padding: 0.25em; border-radius: 0.25em; }
h2.previous > span.badge { background-color: palevioletred; color: whitesmoke; }
p.location { color: dimgray; }
span.file { font-family: 'Menlo', 'Consolas', 'Courier New', monospace; color: darkgreen; }
span.line { color: dodgerblue; }
pre { font-family: 'Menlo', 'Consolas', 'Courier New', monospace; border: thin solid gray;
      border-radius: 0.25em; background-color: whitesmoke; padding: 0.5em; overflow-x: scroll; }
hr { margin: 1.25em 0; border: 2px solid cornflowerblue; }
@media (prefers-color-scheme: dark) {
  html { background-color: #121212; color: #fefefe; }
  p.location { color: darkgray; }
  span.file { color: limegreen; }
  span.line { color: lightskyblue; }
  pre { border: thin solid lightslategray; background-color: dimgray; }
}
"#;

const NO_TRACE: &str = "No backtrace captured. Set RUST_BACKTRACE=1 to record one.";

impl HtmlTemplate {
    fn section(out: &mut String, failure: &Failure, redactor: &PathRedactor, previous: bool) {
        let class = if previous { r#" class="previous""# } else { "" };
        let _ = write!(out, "<h2{}>", class);
        if let Some(code) = failure.code().filter(|c| *c != 0) {
            let _ = write!(out, r#"<span class="badge">{}</span> "#, code);
        }
        let _ = writeln!(out, "{}</h2>", escape_html(&redactor.redact(failure.message())));

        if let Some(location) = failure.location() {
            let _ = writeln!(
                out,
                r#"<p class="location">Error location: <span class="file">{}</span>:<span class="line">{}</span></p>"#,
                escape_html(&redactor.redact(&location.file)),
                location.line
            );
        }

        if failure.location().is_some() || !failure.trace().is_empty() {
            let trace = if failure.trace().is_empty() {
                NO_TRACE.to_string()
            } else {
                redactor.redact(failure.trace())
            };
            let _ = writeln!(out, "<h3>Debug backtrace</h3>\n<pre>{}</pre>", escape_html(&trace));
        }
    }
}

impl ErrorTemplate for HtmlTemplate {
    fn render(&self, failure: &Failure, redactor: &PathRedactor) -> Result<String, RenderError> {
        let mut out = String::with_capacity(4096);
        out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n");
        out.push_str("<meta charset=\"UTF-8\">\n");
        out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        let _ = writeln!(out, "<title>Error {}</title>", clamp_status(failure.code()));
        let _ = writeln!(out, "<style>{}</style>\n</head>\n<body>", STYLE);
        out.push_str("<h1>⁉️ Unhandled Exception</h1>\n");

        Self::section(&mut out, failure, redactor, false);
        for previous in failure.chain().skip(1) {
            out.push_str("<hr>\n");
            Self::section(&mut out, previous, redactor, true);
        }

        out.push_str("</body>\n</html>\n");
        Ok(out)
    }
}

/// A plain text report, also used for log output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextTemplate;

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

impl TextTemplate {
    fn section(out: &mut String, failure: &Failure, redactor: &PathRedactor) {
        let _ = writeln!(out, "{}", redactor.redact(failure.message()));
        if let Some(location) = failure.location() {
            let _ = writeln!(out, "{}:{}", redactor.redact(&location.file), location.line);
        }
        if !failure.trace().is_empty() {
            let _ = writeln!(out, "\n{}", redactor.redact(failure.trace().trim_end()));
        }
    }
}

impl ErrorTemplate for TextTemplate {
    fn render(&self, failure: &Failure, redactor: &PathRedactor) -> Result<String, RenderError> {
        let mut out = String::new();
        let _ = writeln!(out, "Unhandled Exception\n{}", RULE);
        Self::section(&mut out, failure, redactor);

        for previous in failure.chain().skip(1) {
            let _ = writeln!(out, "\n{}\nPrevious Exception", THIN_RULE);
            Self::section(&mut out, previous, redactor);
        }
        Ok(out)
    }

    fn content_type(&self) -> &'static str {
        TEXT
    }
}

/// A user-supplied template file with `{{placeholder}}` substitution.
///
/// Placeholders: `status`, `code`, `message`, `file`, `line`, `trace`,
/// `previous`. Values are HTML-escaped. The file is read on every render.
#[derive(Debug, Clone)]
pub struct FileTemplate {
    path: PathBuf,
    content_type: &'static str,
}

/// Placeholder names a file template may use.
pub const PLACEHOLDERS: &[&str] = &[
    "status", "code", "message", "file", "line", "trace", "previous",
];

impl FileTemplate {
    /// Create a template backed by `path`.
    ///
    /// Files ending in `.txt` render as plain text, anything else as HTML.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => TEXT,
            _ => HTML,
        };
        Self { path, content_type }
    }

    /// Override the content type.
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    /// The template path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn value(name: &str, failure: &Failure, redactor: &PathRedactor) -> Option<String> {
        let value = match name {
            "status" => clamp_status(failure.code()).to_string(),
            "code" => failure.code().map(|c| c.to_string()).unwrap_or_default(),
            "message" => redactor.redact(failure.message()),
            "file" => failure
                .location()
                .map(|l| redactor.redact(&l.file))
                .unwrap_or_default(),
            "line" => failure
                .location()
                .map(|l| l.line.to_string())
                .unwrap_or_default(),
            "trace" => redactor.redact(failure.trace()),
            "previous" => failure
                .chain()
                .skip(1)
                .map(|p| match p.location() {
                    Some(l) => format!("{} ({}:{})", p.message(), l.file, l.line),
                    None => p.message().to_string(),
                })
                .map(|line| redactor.redact(&line))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => return None,
        };
        Some(escape_html(&value))
    }

    /// Substitute placeholders in `source`.
    pub fn fill(
        source: &str,
        failure: &Failure,
        redactor: &PathRedactor,
    ) -> Result<String, RenderError> {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(RenderError::Unclosed(offset + start))?;
            let name = after[..end].trim();
            let value = Self::value(name, failure, redactor)
                .ok_or_else(|| RenderError::UnknownPlaceholder(name.to_string()))?;
            out.push_str(&value);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl ErrorTemplate for FileTemplate {
    fn render(&self, failure: &Failure, redactor: &PathRedactor) -> Result<String, RenderError> {
        let source = std::fs::read_to_string(&self.path).map_err(|source| RenderError::Read {
            path: self.path.clone(),
            source,
        })?;
        Self::fill(&source, failure, redactor)
    }

    fn content_type(&self) -> &'static str {
        self.content_type
    }
}
