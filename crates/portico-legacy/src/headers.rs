//! Parsing of header lines emitted by legacy scripts.

use std::sync::LazyLock;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use regex::Regex;

static STATUS_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^HTTP/\d+(\.\d+)?\s+(\d{3})\b").ok());

/// Status used when a script emits no status line.
pub const DEFAULT_STATUS: u16 = 200;

/// Status and headers recovered from raw header lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHeaders {
    /// Response status.
    pub status: u16,
    /// Response headers, repeated names kept in order.
    pub headers: HeaderMap,
}

/// The status code of a `HTTP/1.1 404 Not Found` style line.
pub fn status_code(line: &str) -> Option<u16> {
    let captures = STATUS_LINE.as_ref()?.captures(line.trim_start())?;
    captures.get(2)?.as_str().parse().ok()
}

/// The lower-cased header name of a `Name: value` line.
pub(crate) fn line_name(line: &str) -> Option<String> {
    let (name, _) = line.split_once(':')?;
    Some(name.trim().to_ascii_lowercase())
}

/// Split raw header lines into a status and a header map.
///
/// The first status line wins; later ones are ignored.
pub fn parse_header_lines<S: AsRef<str>>(lines: &[S]) -> ParsedHeaders {
    let mut status = None;
    let mut headers = HeaderMap::new();

    for line in lines {
        let line = line.as_ref();

        if let Some(code) = status_code(line) {
            if status.is_none() {
                status = Some(code);
            }
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            tracing::warn!(line, "ignoring header line without a colon");
            continue;
        };
        match (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!(line, "ignoring invalid header line"),
        }
    }

    ParsedHeaders {
        status: status.unwrap_or(DEFAULT_STATUS),
        headers,
    }
}
