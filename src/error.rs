//! Classified failures shared by every layer of the crate.
//!
//! Every failure that leaves the upstream integration is mapped into exactly
//! one [`ErrorKind`]. Raw transport errors are kept as the `source` for
//! logging but are never matched on by callers.

use std::fmt;
use thiserror::Error;

/// The fixed failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Canceled,
    DeadlineExceeded,
    InvalidArgument,
    Internal,
    /// Only produced by the Slack signature check.
    Unauthenticated,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Canceled => "Canceled",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::InvalidArgument => "InvalidArgument",
            Self::Internal => "Internal",
            Self::Unauthenticated => "Unauthenticated",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A classified failure with a message and key/value context.
///
/// Context entries are appended as the error travels outwards, so a failed
/// mutation inside a batch reads like
/// `Internal: failed to create next episode records: CreateRecordMutation failed [episode_id=RXBpc29kZS0x]`.
#[derive(Debug, Error)]
#[error("{kind}: {message}{}", render_context(.context))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<BoxError>,
}

fn render_context(context: &[(&'static str, String)]) -> String {
    if context.is_empty() {
        return String::new();
    }
    let pairs = context
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!(" [{pairs}]")
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled, "operation canceled")
    }

    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::DeadlineExceeded, "deadline exceeded")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    /// Builds the error a caller sees when its context ends before the work did.
    #[must_use]
    pub fn from_context_end(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DeadlineExceeded => Self::deadline_exceeded(),
            _ => Self::canceled(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Prefixes the message while keeping the kind and context.
    #[must_use]
    pub fn wrap(mut self, message: impl fmt::Display) -> Self {
        self.message = format!("{message}: {}", self.message);
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
