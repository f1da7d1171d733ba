//! Scoped output capture for legacy scripts.
//!
//! Scripts write their body with [`echo`] (or through [`OutputWriter`]) and
//! their headers with [`header`]. While a [`CaptureGuard`] is open on the
//! current thread, both go into its buffer instead of the process output.

use std::cell::RefCell;
use std::io::{self, Write};
use std::marker::PhantomData;

use crate::headers::{line_name, status_code};

/// Everything a script emitted inside one capture window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Raw header lines, status lines included, in emission order.
    pub header_lines: Vec<String>,
    /// Body bytes.
    pub body: Vec<u8>,
}

thread_local! {
    static STACK: RefCell<Vec<CapturedOutput>> = const { RefCell::new(Vec::new()) };
}

/// An open capture window. Dropping it without [`CaptureGuard::finish`]
/// discards what was captured.
#[must_use = "output is only captured while the guard is alive"]
pub struct CaptureGuard {
    level: usize,
    finished: bool,
    _not_send: PhantomData<*const ()>,
}

impl CaptureGuard {
    /// Start capturing on this thread.
    pub fn begin() -> Self {
        let level = STACK.with_borrow_mut(|stack| {
            stack.push(CapturedOutput::default());
            stack.len()
        });
        Self {
            level,
            finished: false,
            _not_send: PhantomData,
        }
    }

    /// Stop capturing and return the output.
    pub fn finish(mut self) -> CapturedOutput {
        self.finished = true;
        STACK.with_borrow_mut(|stack| {
            stack.truncate(self.level);
            stack.pop().unwrap_or_default()
        })
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if !self.finished {
            STACK.with_borrow_mut(|stack| stack.truncate(self.level.saturating_sub(1)));
        }
    }
}

/// Whether a capture window is open on this thread.
pub fn is_capturing() -> bool {
    STACK.with_borrow(|stack| !stack.is_empty())
}

fn with_top<R>(f: impl FnOnce(&mut CapturedOutput) -> R) -> Option<R> {
    STACK.with_borrow_mut(|stack| stack.last_mut().map(f))
}

/// Write body bytes.
pub fn echo(data: impl AsRef<[u8]>) {
    let data = data.as_ref();
    if with_top(|out| out.body.extend_from_slice(data)).is_none() {
        let mut stdout = io::stdout().lock();
        if let Err(err) = stdout.write_all(data) {
            tracing::warn!(error = %err, "failed to write script output");
        }
    }
}

/// Emit a header line, replacing earlier lines with the same name.
///
/// A status line replaces earlier status lines.
pub fn header(line: impl Into<String>) {
    let line = line.into();
    let replaced = with_top(|out| {
        if status_code(&line).is_some() {
            out.header_lines.retain(|l| status_code(l).is_none());
        } else if let Some(name) = line_name(&line) {
            out.header_lines
                .retain(|l| line_name(l).as_deref() != Some(name.as_str()));
        }
        out.header_lines.push(line.clone());
    });
    if replaced.is_none() {
        tracing::warn!(line = %line, "header emitted outside a capture window");
    }
}

/// Emit a header line, keeping earlier lines with the same name.
pub fn header_add(line: impl Into<String>) {
    let line = line.into();
    if with_top(|out| out.header_lines.push(line.clone())).is_none() {
        tracing::warn!(line = %line, "header emitted outside a capture window");
    }
}

/// Remove every header line with this name.
pub fn header_remove(name: &str) {
    let name = name.to_ascii_lowercase();
    with_top(|out| {
        out.header_lines
            .retain(|l| status_code(l).is_some() || line_name(l).as_deref() != Some(name.as_str()))
    });
}

/// Header lines emitted so far, status lines excluded.
pub fn headers_list() -> Vec<String> {
    with_top(|out| {
        out.header_lines
            .iter()
            .filter(|l| status_code(l).is_none())
            .cloned()
            .collect()
    })
    .unwrap_or_default()
}

/// Set the response status.
pub fn http_response_code(code: u16) {
    header(format!("HTTP/1.1 {}", code));
}

/// An `io::Write` adapter over [`echo`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputWriter;

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        echo(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
