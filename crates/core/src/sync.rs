//! Playback-position lookup over parsed subtitles.
//!
//! Both access patterns only read the entries, so they can be called on every
//! position update from any thread. Overlapping or inverted ranges are taken
//! as written.

use crate::srt::SubtitleEntry;
use std::time::Duration;
use tracing::trace;

impl SubtitleEntry {
    /// Whether `position` falls inside `[start, end]`, both ends inclusive.
    pub fn contains(&self, position: Duration) -> bool {
        position >= self.start && position <= self.end
    }
}

/// Return the first entry in sequence order that is active at `position`.
pub fn find_active(entries: &[SubtitleEntry], position: Duration) -> Option<&SubtitleEntry> {
    entries.iter().find(|entry| entry.contains(position))
}

/// Like [`find_active`] but returns the entry's position in `entries`,
/// which is what a scrolling list needs.
pub fn find_active_index(entries: &[SubtitleEntry], position: Duration) -> Option<usize> {
    entries.iter().position(|entry| entry.contains(position))
}

/// Copy `entries` with `is_active` recomputed for `position`.
/// Several entries may come out active when their ranges overlap.
pub fn refresh_active_flags(entries: &[SubtitleEntry], position: Duration) -> Vec<SubtitleEntry> {
    trace!(
        "refresh_active_flags(entries={}, position_ms={})",
        entries.len(),
        position.as_millis()
    );
    entries
        .iter()
        .map(|entry| SubtitleEntry {
            is_active: entry.contains(position),
            ..entry.clone()
        })
        .collect()
}

/// The latest time any entry mentions, start or end.
pub fn timeline_end(entries: &[SubtitleEntry]) -> Option<Duration> {
    entries.iter().map(|entry| entry.start.max(entry.end)).max()
}
