//! Simulated playback: advance a position on a timer and print each change
//! of the active subtitle.

use anyhow::{ensure, Result};
use std::io::Write;
use std::time::Duration;
use subsync_core::srt::{format_timestamp, SubtitleEntry};
use subsync_core::sync::{find_active_index, timeline_end};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Playback position derived from elapsed time, an offset and a speed factor.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    started: Instant,
    from: Duration,
    speed: f64,
}

impl PlaybackClock {
    /// Start the clock at `from`, advancing `speed` media seconds per second.
    pub fn start(from: Duration, speed: f64) -> Result<Self> {
        ensure!(
            speed.is_finite() && speed > 0.0,
            "speed must be a positive number, got {speed}"
        );
        Ok(Self {
            started: Instant::now(),
            from,
            speed,
        })
    }

    pub fn position(&self) -> Duration {
        let nanos = self.started.elapsed().as_nanos() as f64 * self.speed;
        self.from + Duration::from_nanos(nanos.round() as u64)
    }
}

/// Poll `clock` every `tick` until it passes the last subtitle.
/// Returns the number of active-entry changes written to `out`.
pub async fn follow<W: Write>(
    entries: &[SubtitleEntry],
    clock: &PlaybackClock,
    tick: Duration,
    out: &mut W,
) -> Result<usize> {
    trace!("follow(entries={}, tick_ms={})", entries.len(), tick.as_millis());
    let Some(end) = timeline_end(entries) else {
        return Ok(0);
    };
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut current = None;
    let mut changes = 0;
    loop {
        interval.tick().await;
        let position = clock.position();
        let active = find_active_index(entries, position);
        if active != current {
            let stamp = format_timestamp(position);
            match active {
                Some(i) => writeln!(out, "[{stamp}] {}", entries[i].text.replace('\n', " / "))?,
                None => writeln!(out, "[{stamp}] -")?,
            }
            current = active;
            changes += 1;
        }
        if position > end {
            debug!("playback passed the last subtitle at {}", format_timestamp(end));
            break;
        }
    }
    Ok(changes)
}
