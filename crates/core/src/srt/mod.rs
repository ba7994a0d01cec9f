//! This module is responsible for SRT parsing.
//! It turns index, time range and text lines into ordered subtitle entries,
//! skipping malformed blocks instead of failing unless strict mode is asked for.

pub mod timestamp;

use crate::error::{ParseError, SrtError};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

pub use timestamp::{format_timestamp, parse_timestamp, try_parse_timestamp};

/// Separator between the start and end half of a timestamp line.
const TIME_SEPARATOR: &str = "-->";

/// Represents a single subtitle (index, time range, text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleEntry {
    pub index: u32,
    #[serde(rename = "start_ms", with = "duration_ms")]
    pub start: Duration,
    #[serde(rename = "end_ms", with = "duration_ms")]
    pub end: Duration,
    pub text: String,
    pub is_active: bool,
}

impl SubtitleEntry {
    pub fn new(index: u32, start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
            is_active: false,
        }
    }
}

/// Parse behaviour. The default is lenient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail on the first malformed line or incomplete block.
    pub strict: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Counts of what lenient parsing skipped or patched over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Index lines that were not a non-zero 32-bit integer.
    pub skipped_lines: usize,
    /// Timestamp lines that were malformed or had a half converted to zero.
    pub malformed_timestamps: usize,
    /// Blocks discarded because the index, times or text were missing.
    pub dropped_blocks: usize,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Entries together with the diagnostics gathered while parsing them.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub entries: Vec<SubtitleEntry>,
    pub report: ParseReport,
}

/// Parse pre-split lines into entries, in file order.
/// Malformed blocks are dropped silently.
pub fn parse_lines<I, S>(lines: I) -> Vec<SubtitleEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_lines_with(lines, &ParseOptions::default())
        .map(|parsed| parsed.entries)
        .unwrap_or_default()
}

/// Parse pre-split lines, returning the parse report as well.
/// Only strict mode can return an error.
pub fn parse_lines_with<I, S>(lines: I, options: &ParseOptions) -> Result<Parsed, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = LineParser::new(*options);
    let mut line_no = 0;
    for line in lines {
        line_no += 1;
        let line = line.as_ref();
        let line = if line_no == 1 {
            line.strip_prefix('\u{FEFF}').unwrap_or(line)
        } else {
            line
        };
        parser.feed(line_no, line.trim())?;
    }
    parser.finish(line_no)
}

/// Parse SRT text held in memory.
pub fn parse_str(input: &str) -> Vec<SubtitleEntry> {
    parse_lines(split_lines(input))
}

/// Read a stream to the end and parse it.
pub fn parse_reader<R: Read>(reader: R) -> Result<Vec<SubtitleEntry>, SrtError> {
    Ok(parse_reader_with(reader, &ParseOptions::default())?.entries)
}

pub fn parse_reader_with<R: Read>(reader: R, options: &ParseOptions) -> Result<Parsed, SrtError> {
    let text = read_text(reader)?;
    Ok(parse_lines_with(split_lines(&text), options)?)
}

/// Read and parse an SRT file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<SubtitleEntry>, SrtError> {
    Ok(parse_file_with(path, &ParseOptions::default())?.entries)
}

pub fn parse_file_with(path: impl AsRef<Path>, options: &ParseOptions) -> Result<Parsed, SrtError> {
    let path = path.as_ref();
    trace!("parse_file_with(path={}, strict={})", path.display(), options.strict);
    let text = {
        let file = File::open(path).map_err(|e| SrtError::read(path, e))?;
        read_text(file).map_err(|e| SrtError::read(path, e))?
    };
    Ok(parse_lines_with(split_lines(&text), options)?)
}

/// Split on `\r\n`, `\r` or `\n`. A trailing line ending does not
/// produce an extra empty line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(i) => {
                let ending = if current[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[i + ending..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                (!current.is_empty()).then_some(current)
            }
        }
    })
}

/// Decode the whole source as UTF-8, replacing invalid sequences.
fn read_text<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Which line the block under construction expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingIndex,
    AwaitingTimestamp,
    AccumulatingText,
}

/// Working fields of the block under construction.
#[derive(Debug, Default)]
struct Block {
    index: Option<i32>,
    times: Option<(Duration, Duration)>,
    text: String,
}

impl Block {
    fn state(&self) -> State {
        match (self.index, self.times) {
            (None, _) => State::AwaitingIndex,
            (Some(_), None) => State::AwaitingTimestamp,
            (Some(_), Some(_)) => State::AccumulatingText,
        }
    }

    fn push_text(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }

    /// Turn the block into an entry if index, times and text are all present.
    fn into_entry(self) -> Option<SubtitleEntry> {
        let index = u32::try_from(self.index?).ok().filter(|i| *i > 0)?;
        let (start, end) = self.times?;
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(SubtitleEntry::new(index, start, end, text))
    }
}

/// One pass over trimmed lines. All state is local to a parse call.
struct LineParser {
    options: ParseOptions,
    block: Block,
    entries: Vec<SubtitleEntry>,
    report: ParseReport,
}

impl LineParser {
    fn new(options: ParseOptions) -> Self {
        Self {
            options,
            block: Block::default(),
            entries: Vec::new(),
            report: ParseReport::default(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        if line.is_empty() {
            return self.close_block(line_no);
        }
        match self.block.state() {
            State::AwaitingIndex => self.read_index(line_no, line),
            State::AwaitingTimestamp if line.contains(TIME_SEPARATOR) => {
                self.read_times(line_no, line)
            }
            State::AwaitingTimestamp => {
                // Accumulated anyway; the block is dropped when it closes.
                if self.options.strict {
                    return Err(ParseError::InvalidTimestampLine {
                        line: line_no,
                        value: line.to_string(),
                    });
                }
                self.block.push_text(line);
                Ok(())
            }
            State::AccumulatingText => {
                self.block.push_text(line);
                Ok(())
            }
        }
    }

    fn read_index(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        match line.parse::<i32>() {
            Ok(0) | Err(_) => {
                if self.options.strict {
                    return Err(ParseError::InvalidIndex {
                        line: line_no,
                        value: line.to_string(),
                    });
                }
                trace!("skipping line {line_no}: not a sequence number");
                self.report.skipped_lines += 1;
            }
            Ok(index) => {
                if index < 0 && self.options.strict {
                    return Err(ParseError::InvalidIndex {
                        line: line_no,
                        value: line.to_string(),
                    });
                }
                self.block.index = Some(index);
            }
        }
        Ok(())
    }

    fn read_times(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        let halves: Vec<&str> = line.split(TIME_SEPARATOR).map(str::trim).collect();
        let [start, end] = halves[..] else {
            if self.options.strict {
                return Err(ParseError::InvalidTimestampLine {
                    line: line_no,
                    value: line.to_string(),
                });
            }
            debug!("malformed timestamp line {line_no}: '{line}'");
            self.report.malformed_timestamps += 1;
            return Ok(());
        };
        let mut zeroed = false;
        let mut convert = |half: &str| -> Result<Duration, ParseError> {
            if self.options.strict {
                return try_parse_timestamp(half).map_err(|source| ParseError::InvalidTimestamp {
                    line: line_no,
                    value: half.to_string(),
                    source,
                });
            }
            Ok(timestamp::convert_lenient(half).unwrap_or_else(|_| {
                zeroed = true;
                Duration::ZERO
            }))
        };
        let start = convert(start)?;
        let end = convert(end)?;
        if zeroed {
            debug!("timestamp on line {line_no} converted to zero: '{line}'");
            self.report.malformed_timestamps += 1;
        }
        self.block.times = Some((start, end));
        Ok(())
    }

    /// Finalize or discard the pending block and reset to awaiting an index.
    fn close_block(&mut self, line_no: usize) -> Result<(), ParseError> {
        let block = std::mem::take(&mut self.block);
        if block.index.is_none() {
            return Ok(());
        }
        match block.into_entry() {
            Some(entry) => self.entries.push(entry),
            None => {
                if self.options.strict {
                    return Err(ParseError::IncompleteBlock { line: line_no });
                }
                debug!("dropping incomplete block ending at line {line_no}");
                self.report.dropped_blocks += 1;
            }
        }
        Ok(())
    }

    fn finish(mut self, line_no: usize) -> Result<Parsed, ParseError> {
        self.close_block(line_no)?;
        debug!(
            "parsed {} entries (skipped_lines={}, malformed_timestamps={}, dropped_blocks={})",
            self.entries.len(),
            self.report.skipped_lines,
            self.report.malformed_timestamps,
            self.report.dropped_blocks
        );
        Ok(Parsed {
            entries: self.entries,
            report: self.report,
        })
    }
}

/// Serialize durations as whole milliseconds, failing rather than truncating.
mod duration_ms {
    use serde::{ser, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).map_err(<S::Error as ser::Error>::custom)?;
        serializer.serialize_u64(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::tempdir;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    const TWO_BLOCKS: &str =
        "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,500 --> 00:00:04,250\nWorld\n";

    /// Two well-formed blocks give two entries in file order.
    #[test]
    fn parses_blocks_in_order() {
        let entries = parse_str(TWO_BLOCKS);
        assert_eq!(
            entries,
            vec![
                SubtitleEntry::new(1, ms(1000), ms(2000), "Hello"),
                SubtitleEntry::new(2, ms(3500), ms(4250), "World"),
            ]
        );
        assert!(entries.iter().all(|e| !e.is_active));
    }

    /// A trailing blank line makes no difference.
    #[test]
    fn trailing_blank_line_is_optional() {
        let with_blank = format!("{TWO_BLOCKS}\n\n");
        assert_eq!(parse_str(TWO_BLOCKS), parse_str(&with_blank));
    }

    /// Parsing the same lines twice yields equal output.
    #[test]
    fn reparsing_is_idempotent() {
        let lines: Vec<&str> = TWO_BLOCKS.lines().collect();
        assert_eq!(parse_lines(&lines), parse_lines(&lines));
    }

    /// Consecutive text lines are joined with one newline.
    #[test]
    fn joins_multiline_text() {
        let entries = parse_lines([
            "7",
            "00:00:01,000 --> 00:00:02,000",
            "  first line ",
            "second line",
            "",
        ]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 7);
        assert_eq!(entries[0].text, "first line\nsecond line");
    }

    /// A non-numeric index line drops that block but not the rest.
    #[test]
    fn drops_block_with_bad_index() {
        let input = "abc\n00:00:01,000 --> 00:00:02,000\nLost\n\n\
                     2\n00:00:03,000 --> 00:00:04,000\nKept\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].text, "Kept");
        // "abc", the timestamp line and "Lost" are all tried as index lines.
        assert_eq!(parsed.report.skipped_lines, 3);
        assert_eq!(parsed.report.dropped_blocks, 0);
    }

    /// Without a timestamp line the block cannot finalize.
    #[test]
    fn drops_block_without_times() {
        let input = "1\nno times here\n\n2\n00:00:03,000 --> 00:00:04,000\nKept\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].index, 2);
        assert_eq!(parsed.report.dropped_blocks, 1);
    }

    /// A timestamp line with three halves leaves the times unset.
    #[test]
    fn drops_block_with_extra_separator() {
        let input = "1\n00:00:01,000 --> 00:00:02,000 --> 00:00:03,000\nText\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.report.malformed_timestamps, 1);
        assert_eq!(parsed.report.dropped_blocks, 1);
    }

    /// Blocks with no text are dropped at the blank line.
    #[test]
    fn drops_block_without_text() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\n\n2\n00:00:03,000 --> 00:00:04,000\nKept\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.report.dropped_blocks, 1);
    }

    /// Malformed timestamps become zero and are counted.
    #[test]
    fn zeroes_malformed_timestamps() {
        let input = "1\n00:00:01 --> 00:00:02,000\nText\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert_eq!(parsed.entries[0].start, Duration::ZERO);
        assert_eq!(parsed.entries[0].end, ms(2000));
        assert_eq!(parsed.report.malformed_timestamps, 1);
    }

    /// Zero and negative indices never produce an entry.
    #[test]
    fn rejects_non_positive_indices() {
        let input = "0\n-3\n00:00:01,000 --> 00:00:02,000\nText\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.report.skipped_lines, 1);
        assert_eq!(parsed.report.dropped_blocks, 1);
    }

    /// Inverted and out-of-order ranges are kept as written.
    #[test]
    fn keeps_inverted_and_unsorted_ranges() {
        let input = "5\n00:00:09,000 --> 00:00:08,000\nLate\n\n5\n00:00:01,000 --> 00:00:02,000\nEarly\n";
        let entries = parse_str(input);
        assert_eq!(entries[0].start, ms(9000));
        assert_eq!(entries[0].end, ms(8000));
        assert_eq!(entries[1].text, "Early");
        assert_eq!(entries[1].index, 5);
    }

    /// Once times are set, a line with `-->` is plain text.
    #[test]
    fn separator_in_text_is_text() {
        let entries = parse_lines(["1", "00:00:01,000 --> 00:00:02,000", "a --> b"]);
        assert_eq!(entries[0].text, "a --> b");
    }

    /// A byte order mark and CRLF line endings are tolerated.
    #[test]
    fn handles_bom_and_crlf() {
        let input = "\u{FEFF}1\r\n00:00:01,000 --> 00:00:02,000\r\nHello\r\n\r\n";
        let entries = parse_str(input);
        assert_eq!(entries, vec![SubtitleEntry::new(1, ms(1000), ms(2000), "Hello")]);
    }

    /// Strict mode reports the first problem with its line number.
    #[test]
    fn strict_mode_fails_fast() {
        let strict = ParseOptions::strict();
        let err = parse_lines_with(["abc"], &strict).unwrap_err();
        assert!(matches!(err, ParseError::InvalidIndex { line: 1, .. }));

        let err = parse_lines_with(["1", "00:00:01 --> 00:00:02,000", "x"], &strict).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { line: 2, .. }));

        let err = parse_lines_with(["1", "text"], &strict).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestampLine { line: 2, .. }));

        let err = parse_lines_with(["1", "00:00:01,000 --> 00:00:02,000", ""], &strict).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteBlock { line: 3 }));

        let parsed = parse_lines_with(TWO_BLOCKS.lines(), &strict).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert!(parsed.report.is_clean());
    }

    /// Files are read and parsed; a missing file is an error, not an empty list.
    #[test]
    fn parses_files_and_reports_missing_ones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("movie.srt");
        std::fs::write(&path, TWO_BLOCKS).unwrap();
        assert_eq!(parse_file(&path).unwrap().len(), 2);

        let empty = dir.path().join("empty.srt");
        std::fs::write(&empty, "").unwrap();
        assert!(parse_file(&empty).unwrap().is_empty());

        let err = parse_file(dir.path().join("missing.srt")).unwrap_err();
        assert!(matches!(err, SrtError::ReadError { .. }));
    }

    /// A failing stream surfaces its I/O error.
    #[test]
    fn stream_errors_propagate() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "boom"))
            }
        }
        assert!(matches!(parse_reader(Broken), Err(SrtError::Io(_))));
        assert_eq!(parse_reader(TWO_BLOCKS.as_bytes()).unwrap().len(), 2);
    }

    /// Old Mac files end lines with a bare carriage return.
    #[test]
    fn handles_cr_only_line_endings() {
        let input = "1\r00:00:01,000 --> 00:00:02,000\rHello\r\r2\r00:00:03,000 --> 00:00:04,000\rWorld\r";
        let expected = vec![
            SubtitleEntry::new(1, ms(1000), ms(2000), "Hello"),
            SubtitleEntry::new(2, ms(3000), ms(4000), "World"),
        ];
        assert_eq!(parse_reader(input.as_bytes()).unwrap(), expected);
        assert_eq!(parse_str(input), expected);

        let dir = tempdir().unwrap();
        let path = dir.path().join("classic.srt");
        std::fs::write(&path, input).unwrap();
        assert_eq!(parse_file(&path).unwrap(), expected);
    }

    /// Line endings may be mixed within one file.
    #[test]
    fn splits_mixed_line_endings() {
        let lines: Vec<&str> = split_lines("a\r\nb\rc\n\nd\r\n").collect();
        assert_eq!(lines, vec!["a", "b", "c", "", "d"]);
        assert_eq!(split_lines("").count(), 0);
    }

    /// Index lines beyond 32 bits are skipped like any other non-index line.
    #[test]
    fn skips_index_beyond_32_bits() {
        let input = "3000000000\n00:00:01,000 --> 00:00:02,000\nText\n";
        let parsed = parse_lines_with(input.lines(), &ParseOptions::default()).unwrap();
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.report.skipped_lines, 3);
        assert_eq!(parsed.report.dropped_blocks, 0);

        let err = parse_lines_with(input.lines(), &ParseOptions::strict()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidIndex { line: 1, .. }));
    }

    /// Durations too large for whole milliseconds in a u64 fail to serialize.
    #[test]
    fn refuses_to_truncate_huge_durations() {
        let entry = SubtitleEntry::new(1, Duration::MAX, Duration::MAX, "Forever");
        assert!(serde_json::to_value(&entry).is_err());
    }

    /// Entries serialize with millisecond times.
    #[test]
    fn serializes_entries_as_millis() {
        let entry = SubtitleEntry::new(1, ms(1000), ms(2500), "Hi");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index": 1,
                "start_ms": 1000,
                "end_ms": 2500,
                "text": "Hi",
                "is_active": false
            })
        );
    }
}
