//! Error types for bit buffers, streams and format trees.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while reading, writing, parsing or composing.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller supplied a value the operation cannot accept (width too large,
    /// value wider than its field, negative seek target).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid in the current state (popping more bits than
    /// held, using a closed stream, mixing read and write inside one byte).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The byte source has no more data.
    #[error("unexpected end of stream")]
    EndOfStream,

    /// The data or the format tree does not describe a valid layout.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A choice selector value has no mapped branch.
    #[error("unknown choice selector {key}, choices are [{}]", .choices.join(", "))]
    UnknownChoice { key: String, choices: Vec<String> },

    /// A sized sequence does not hold the number of items its size expression demands.
    #[error("expected {expected} items, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// The node cannot reconstruct the bytes it consumed.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Parsing finished before the end of the stream.
    #[error("unconsumed data after byte offset {position}")]
    TrailingData { position: u64 },

    /// The underlying byte source failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    EndOfStream,
    InvalidFormat,
    Unsupported,
    Io,
}

impl Error {
    /// Returns the kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::EndOfStream => ErrorKind::EndOfStream,
            Error::InvalidFormat(_)
            | Error::UnknownChoice { .. }
            | Error::CountMismatch { .. }
            | Error::TrailingData { .. } => ErrorKind::InvalidFormat,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// True for [`Error::EndOfStream`].
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }
}
