//! Error types for mathclip operations.

use thiserror::Error;

use crate::format::Format;

/// Errors surfaced by extraction, clipboard and command handling.
#[derive(Error, Debug)]
pub enum Error {
    /// Extraction was handed a node that is not an element.
    #[error("not an element: node {0}")]
    InvalidElement(u32),

    /// Extracted content or a clipboard payload exceeds its size bound.
    #[error("content too large: {len} characters (max {max})")]
    ContentTooLarge { len: usize, max: usize },

    /// Nothing to write (empty after trimming).
    #[error("content is empty")]
    EmptyContent,

    /// The container offers no source for the requested format.
    #[error("no {format} source available")]
    NoSource { format: Format },

    /// Extracted MathML failed the structural check.
    #[error("extracted MathML is not valid")]
    InvalidMathML,

    /// No clipboard path accepted the payload.
    #[error("clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    /// A format name outside the supported set.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// A renderer selector failed to compile.
    #[error("invalid selector: {0}")]
    Selector(String),

    /// A command or settings payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// How loudly a failure should be reported to the user.
    pub fn severity(&self) -> Severity {
        match self {
            Error::InvalidElement(_) | Error::ClipboardUnavailable(_) => Severity::High,
            Error::ContentTooLarge { .. }
            | Error::EmptyContent
            | Error::NoSource { .. }
            | Error::InvalidMathML => Severity::Medium,
            Error::UnknownFormat(_) => Severity::Low,
            Error::Selector(_) | Error::Json(_) | Error::Io(_) => Severity::High,
        }
    }
}

/// Severity attached to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

pub type Result<T> = std::result::Result<T, Error>;
