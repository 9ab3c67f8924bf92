//! Error types for scheduler construction and platform probing.
//!
//! Errors are explicit and typed (no stringly-typed errors). Submissions
//! themselves never return errors: by contract, a rejected submission is an
//! absence of effect plus a log entry, so error values here only surface
//! from construction paths and platform probes.

use core::fmt;
use std::io;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A worker thread could not be spawned at construction.
    ThreadSpawn,
    /// The requested host dispatcher is unavailable on this platform.
    Unsupported,
}

impl ErrorKind {
    /// Returns true when the error invalidates the scheduler instance.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::ThreadSpawn)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::ThreadSpawn => "worker thread spawn failed",
            Self::Unsupported => "host dispatcher unavailable on this platform",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduler error.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<io::Error>,
}

impl Error {
    pub(crate) const fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn thread_spawn(source: io::Error) -> Self {
        Self {
            kind: ErrorKind::ThreadSpawn,
            source: Some(source),
        }
    }

    /// The error's kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true when the error invalidates the scheduler instance.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.kind),
            None => self.kind.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}
