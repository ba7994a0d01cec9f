//! Core library for subsync: SRT parsing and playback-position lookup.

pub mod error;
pub mod srt;
pub mod sync;

pub use error::{ParseError, SrtError, TimestampError};
pub use srt::{ParseOptions, ParseReport, Parsed, SubtitleEntry};
