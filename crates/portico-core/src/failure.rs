//! Renderable failure records.
//!
//! A [`Failure`] is what the error page receives: a message, an optional
//! code, where it was raised, the stack context at that point, and the chain
//! of earlier failures that caused it (newest first).

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;
use std::panic::Location;

use crate::Coded;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No collaborator could resolve the request.
    NotFound,
    /// A static adapter, router or script raised.
    Delegate,
    /// The error template itself failed.
    Render,
    /// A delegate panicked.
    Panic,
    /// Anything else.
    Other,
}

/// Source location where a failure was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path.
    pub file: String,
    /// Line number.
    pub line: u32,
}

impl SourceLocation {
    /// Create a new location.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// The location of the caller.
    #[track_caller]
    pub fn here() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A failure, with its chain of causes.
#[derive(Debug, Clone)]
pub struct Failure {
    kind: FailureKind,
    message: String,
    code: Option<i64>,
    location: Option<SourceLocation>,
    trace: String,
    previous: Option<Box<Failure>>,
}

impl Failure {
    /// Create a failure raised at the caller's location.
    #[track_caller]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            location: Some(Location::caller().into()),
            trace: capture_trace(),
            previous: None,
        }
    }

    /// Create a "not found" failure with code 404.
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message).with_code(404)
    }

    /// Build a failure from any error, following its `source()` chain.
    #[track_caller]
    pub fn from_error(kind: FailureKind, err: &(dyn Error + 'static)) -> Self {
        let mut failure = Self::new(kind, err.to_string());
        failure.previous = err.source().map(|source| Box::new(Self::from_source(source)));
        failure
    }

    /// Build a failure from an error that carries a code. An error that
    /// recorded its raise site keeps it; otherwise the caller is used.
    #[track_caller]
    pub fn from_coded<E: Coded + 'static>(kind: FailureKind, err: &E) -> Self {
        let mut failure = Self::from_error(kind, err);
        failure.code = err.code();
        if let Some(location) = err.raised_at() {
            failure.location = Some(location);
        }
        failure
    }

    fn from_source(err: &(dyn Error + 'static)) -> Self {
        Self {
            kind: FailureKind::Other,
            message: err.to_string(),
            code: None,
            location: None,
            trace: String::new(),
            previous: err.source().map(|source| Box::new(Self::from_source(source))),
        }
    }

    /// Set the code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Override the recorded location.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Override the recorded stack context.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }

    /// Attach a cause. It goes after any causes already attached.
    pub fn with_previous(mut self, previous: Failure) -> Self {
        self.previous = Some(Box::new(match self.previous.take() {
            Some(existing) => existing.with_previous(previous),
            None => previous,
        }));
        self
    }

    /// Remove location, stack context and causes.
    pub fn without_details(mut self) -> Self {
        self.location = None;
        self.trace.clear();
        self.previous = None;
        self
    }

    /// The failure kind.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The code, if any.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Where the failure was raised.
    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// Rendered stack context; empty when none was captured.
    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// The direct cause.
    pub fn previous(&self) -> Option<&Failure> {
        self.previous.as_deref()
    }

    /// This failure followed by every cause, oldest last.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.previous.as_deref().map(|p| p as &(dyn Error + 'static))
    }
}

/// Iterator over a failure and its causes.
pub struct Chain<'a> {
    next: Option<&'a Failure>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Failure;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.previous();
        Some(current)
    }
}

fn capture_trace() -> String {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("forbidden area")]
    struct Forbidden;

    impl Coded for Forbidden {
        fn code(&self) -> Option<i64> {
            Some(403)
        }
    }

    #[test]
    fn test_new_records_caller_location() {
        let failure = Failure::new(FailureKind::Other, "boom");
        let location = failure.location().unwrap();

        assert!(location.file.ends_with("failure.rs"));
        assert!(location.line > 0);
        assert_eq!(failure.code(), None);
    }

    #[test]
    fn test_not_found_has_404() {
        let failure = Failure::not_found("Not Found");
        assert_eq!(failure.code(), Some(404));
        assert_eq!(failure.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_from_error_follows_source_chain() {
        let err = Outer {
            inner: std::io::Error::new(std::io::ErrorKind::Other, "disk gone"),
        };
        let failure = Failure::from_error(FailureKind::Delegate, &err);

        let messages: Vec<&str> = failure.chain().map(|f| f.message()).collect();
        assert_eq!(messages, vec!["outer failure", "disk gone"]);
    }

    #[test]
    fn test_from_coded_takes_code() {
        let failure = Failure::from_coded(FailureKind::Delegate, &Forbidden);
        assert_eq!(failure.code(), Some(403));
        assert_eq!(failure.message(), "forbidden area");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("raised elsewhere")]
    struct RaisedElsewhere;

    impl Coded for RaisedElsewhere {
        fn raised_at(&self) -> Option<SourceLocation> {
            Some(SourceLocation::new("src/handlers/admin.rs", 12))
        }
    }

    #[test]
    fn test_from_coded_keeps_raise_site() {
        let failure = Failure::from_coded(FailureKind::Delegate, &RaisedElsewhere);
        assert_eq!(
            failure.location(),
            Some(&SourceLocation::new("src/handlers/admin.rs", 12))
        );

        let failure = Failure::from_coded(FailureKind::Delegate, &Forbidden);
        assert!(failure.location().unwrap().file.ends_with("failure.rs"));
    }

    #[test]
    fn test_here_is_caller() {
        let location = SourceLocation::here();
        assert!(location.file.ends_with("failure.rs"));
        assert_eq!(location.line, line!() - 2);
    }

    #[test]
    fn test_with_previous_appends_oldest_last() {
        let failure = Failure::new(FailureKind::Other, "a")
            .with_previous(Failure::new(FailureKind::Other, "b"))
            .with_previous(Failure::new(FailureKind::Other, "c"));

        let messages: Vec<&str> = failure.chain().map(|f| f.message()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_without_details() {
        let failure = Failure::new(FailureKind::Other, "a")
            .with_trace("frame 0")
            .with_previous(Failure::new(FailureKind::Other, "b"))
            .without_details();

        assert!(failure.location().is_none());
        assert!(failure.trace().is_empty());
        assert!(failure.previous().is_none());
        assert_eq!(failure.message(), "a");
    }

    #[test]
    fn test_error_source_is_previous() {
        let failure = Failure::new(FailureKind::Other, "a")
            .with_previous(Failure::new(FailureKind::Other, "b"));

        let source = failure.source().unwrap();
        assert_eq!(source.to_string(), "b");
    }
}
