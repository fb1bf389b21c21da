//! Purpose: Error types shared by the pagination engine and its store clients.
//! Exports: `Error`, `ErrorKind`, `PageError`, `to_exit_code`.
//! Invariants: `PageError::Exhausted` is a normal terminal signal, never a failure.
//! Invariants: Store and transform failures are surfaced, never retried internally.

use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    Transport,
    Decode,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    view: Option<String>,
    status: Option<u16>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            view: None,
            status: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(view) = &self.view {
            write!(f, " (view: {view})")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

/// Outcome of a pager traversal that did not produce a page.
///
/// `Exhausted` means the traversal ran off either end of the view: expected,
/// recoverable, and distinguishable from real failures by type. `Iteration`
/// wraps any store or transform error raised during a page fetch.
#[derive(Debug)]
pub enum PageError {
    Exhausted,
    Iteration(Error),
}

impl PageError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PageError::Exhausted)
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::Exhausted => write!(f, "no more data in this direction"),
            PageError::Iteration(err) => write!(f, "iteration failed: {err}"),
        }
    }
}

impl StdError for PageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PageError::Exhausted => None,
            PageError::Iteration(err) => Some(err),
        }
    }
}

impl From<Error> for PageError {
    fn from(err: Error) -> Self {
        PageError::Iteration(err)
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Transport => 4,
        ErrorKind::Decode => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, PageError, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::NotFound, 3),
            (ErrorKind::Transport, 4),
            (ErrorKind::Decode, 5),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::Transport)
            .with_message("view request failed")
            .with_view("images/by_creation_time")
            .with_status(502);
        let rendered = err.to_string();
        assert!(rendered.contains("Transport"));
        assert!(rendered.contains("view request failed"));
        assert!(rendered.contains("images/by_creation_time"));
        assert!(rendered.contains("502"));
    }

    #[test]
    fn exhausted_is_not_a_failure_kind() {
        let err = PageError::Exhausted;
        assert!(err.is_exhausted());
        let err = PageError::from(Error::new(ErrorKind::Decode));
        assert!(!err.is_exhausted());
    }
}
