//! Script runners execute a script file inside an open ambient and capture
//! window.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{ambient, capture, ScriptError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes script files.
///
/// Implementations read the request from [`ambient`] and write their
/// output through [`capture`].
pub trait ScriptRunner: Send + Sync {
    /// Run the script at `path`.
    fn run_file(&self, path: &Path) -> Result<(), ScriptError>;
}

/// Runs scripts through an external CGI interpreter such as `php-cgi`.
#[derive(Debug, Clone)]
pub struct CgiRunner {
    interpreter: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for CgiRunner {
    fn default() -> Self {
        Self::new("php-cgi")
    }
}

impl CgiRunner {
    /// Create a runner for the given interpreter.
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Add interpreter arguments, placed before the script path.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kill the interpreter after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The interpreter path.
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn command(&self, path: &Path) -> Command {
        let context = ambient::snapshot();
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.args)
            .arg(path)
            .env_clear()
            .envs(&context.server)
            .env("GATEWAY_INTERFACE", "CGI/1.1")
            .env("SERVER_PROTOCOL", "HTTP/1.1")
            .env("REDIRECT_STATUS", "200")
            .env("SCRIPT_FILENAME", path)
            .env("CONTENT_LENGTH", context.input.len().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(content_type) = context.server.get("HTTP_CONTENT_TYPE") {
            cmd.env("CONTENT_TYPE", content_type);
        }
        if let Some(path_var) = std::env::var_os("PATH") {
            cmd.env("PATH", path_var);
        }
        cmd
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ScriptError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // The child may already have exited between the checks.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ScriptError::timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl ScriptRunner for CgiRunner {
    fn run_file(&self, path: &Path) -> Result<(), ScriptError> {
        tracing::debug!(
            interpreter = %self.interpreter.display(),
            script = %path.display(),
            "running CGI script"
        );

        let mut child = self
            .command(path)
            .spawn()
            .map_err(|source| ScriptError::spawn(self.interpreter.display().to_string(), source))?;

        let input = ambient::input();
        let stdin = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                // A script that ignores its body closes the pipe early.
                let _ = stdin.write_all(&input);
            })
        });
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        // On timeout the reader threads stay detached rather than joined. They
        // end once every process holding the pipes has exited, which can be
        // later than the killed interpreter if it left children behind.
        let status = self.wait(&mut child)?;

        if let Some(handle) = stdin {
            let _ = handle.join();
        }
        let stdout = collect(stdout)?;
        let stderr = collect(stderr)?;
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();

        if !status.success() && stdout.is_empty() {
            return Err(ScriptError::exited(status.to_string(), stderr));
        }
        if !stderr.is_empty() {
            tracing::warn!(script = %path.display(), stderr = %stderr, "script wrote to stderr");
        }

        emit_cgi_output(&stdout);
        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, ScriptError> {
    match handle {
        Some(handle) => match handle.join() {
            Ok(result) => Ok(result?),
            Err(_) => Err(ScriptError::raise("output reader thread panicked")),
        },
        None => Ok(Vec::new()),
    }
}

/// Split a CGI response into header lines and body and emit both.
fn emit_cgi_output(output: &[u8]) {
    let Some((head, body)) = split_cgi_response(output) else {
        capture::echo(output);
        return;
    };

    for line in head.lines().filter(|l| !l.trim().is_empty()) {
        match line.split_once(':') {
            Some((name, value)) if name.trim().eq_ignore_ascii_case("status") => {
                capture::header(format!("HTTP/1.1 {}", value.trim()));
            }
            _ => capture::header_add(line.trim_end()),
        }
    }
    capture::echo(body);
}

/// Find the blank line ending the CGI header block.
fn split_cgi_response(output: &[u8]) -> Option<(String, &[u8])> {
    let (end, sep_len) = [&b"\r\n\r\n"[..], &b"\n\n"[..]]
        .iter()
        .filter_map(|sep| find(output, sep).map(|pos| (pos, sep.len())))
        .min_by_key(|(pos, _)| *pos)?;

    let head = std::str::from_utf8(&output[..end]).ok()?;
    if !head.lines().all(|l| l.trim().is_empty() || l.contains(':')) {
        return None;
    }
    Some((head.to_string(), &output[end + sep_len..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
