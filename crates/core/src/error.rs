//! Error types for reading and parsing subtitles.

use std::path::PathBuf;

/// Errors that can occur while reading a subtitle source.
#[derive(Debug, thiserror::Error)]
pub enum SrtError {
    /// Failed to open or read a subtitle file.
    #[error("Failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read from a stream.
    #[error("Failed to read subtitle stream: {0}")]
    Io(#[from] std::io::Error),

    /// Strict parsing rejected the input.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl SrtError {
    /// Create a read error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by strict parsing. Lenient parsing never produces these.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Expected a positive sequence number.
    #[error("Invalid sequence number at line {line}: '{value}'")]
    InvalidIndex { line: usize, value: String },

    /// Expected a `start --> end` line.
    #[error("Invalid timestamp line at line {line}: '{value}'")]
    InvalidTimestampLine { line: usize, value: String },

    /// One half of a timestamp line did not convert.
    #[error("Invalid timestamp at line {line}: '{value}': {source}")]
    InvalidTimestamp {
        line: usize,
        value: String,
        source: TimestampError,
    },

    /// A blank line or end of input arrived before the block was complete.
    #[error("Incomplete subtitle block ending at line {line}")]
    IncompleteBlock { line: usize },
}

/// Errors from converting a single `H:MM:SS,mmm` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),

    #[error("field '{0}' is not an integer")]
    InvalidField(String),

    #[error("negative field '{0}'")]
    Negative(String),

    #[error("timestamp is out of range")]
    Overflow,
}
