//! The error taxonomy surfaced by the executor.

use std::fmt;

/// An error produced while evaluating a parsed program.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Wraps an [`ErrorKind`] as an [`Error`].
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Returns the error's kind, used by the executor's propagation policy
    /// to decide whether to suppress or escalate it.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Formats the user-visible message written to stderr, per the
    /// per-kind formats the executor's error-handling policy specifies.
    /// Empty only if a future error kind deliberately suppresses a
    /// message — none currently do.
    pub fn display_message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }
}

/// The taxonomy of errors the executor can produce.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Tokenizing or parsing the source text failed.
    #[error("syntax error: {0}")]
    Syntax(#[from] posh_parser::ParseError),

    /// A redirection's fd-duplication target was missing, non-numeric, or
    /// a file open/close failed.
    #[error("io error: {0}")]
    IoRedirection(String),

    /// No registered [`crate::commands::Command`] matched the resolved
    /// command name.
    #[error("{0}: command not found")]
    UnknownCommand(String),

    /// An AST shape the executor deliberately does not implement, e.g. a
    /// simple command running in the background.
    #[error("unsupported execution: {0}")]
    Unsupported(String),

    /// A read or write on a file stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
