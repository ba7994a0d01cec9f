//! Conversion between SRT timestamps (`H:MM:SS,mmm`) and durations.

use crate::error::TimestampError;
use std::time::Duration;

/// Convert a timestamp like `00:01:02,003` to a duration.
///
/// Anything that does not split into four integer fields on `:` and `,`
/// converts to `Duration::ZERO`, as does a total that comes out negative.
pub fn parse_timestamp(timestamp: &str) -> Duration {
    convert_lenient(timestamp).unwrap_or(Duration::ZERO)
}

/// Strict variant of [`parse_timestamp`] that reports why a timestamp
/// was rejected. Negative fields are rejected even if the total is positive.
pub fn try_parse_timestamp(timestamp: &str) -> Result<Duration, TimestampError> {
    let fields = fields(timestamp)?;
    if let Some(raw) = timestamp
        .split([':', ','])
        .zip(fields)
        .find_map(|(raw, value)| (value < 0).then_some(raw))
    {
        return Err(TimestampError::Negative(raw.to_string()));
    }
    let ms = total_ms(fields)?;
    Ok(Duration::from_millis(ms as u64))
}

/// Lenient conversion that still tells the parser when it had to fall back.
pub(crate) fn convert_lenient(timestamp: &str) -> Result<Duration, TimestampError> {
    let ms = total_ms(fields(timestamp)?)?;
    if ms < 0 {
        return Err(TimestampError::Negative(timestamp.to_string()));
    }
    Ok(Duration::from_millis(ms as u64))
}

/// Format a duration as `HH:MM:SS,mmm`. Hours widen past two digits.
pub fn format_timestamp(duration: Duration) -> String {
    let ms = duration.as_millis();
    let h = ms / 3_600_000;
    let m = (ms % 3_600_000) / 60_000;
    let s = (ms % 60_000) / 1000;
    let ms = ms % 1000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn fields(timestamp: &str) -> Result<[i64; 4], TimestampError> {
    let parts: Vec<&str> = timestamp.split([':', ',']).collect();
    if parts.len() != 4 {
        return Err(TimestampError::FieldCount(parts.len()));
    }
    let mut out = [0i64; 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| TimestampError::InvalidField(part.to_string()))?;
    }
    Ok(out)
}

/// `((h * 3600 + m * 60 + s) * 1000) + ms`, in checked signed arithmetic.
fn total_ms([h, m, s, ms]: [i64; 4]) -> Result<i64, TimestampError> {
    h.checked_mul(3600)
        .and_then(|v| v.checked_add(m.checked_mul(60)?))
        .and_then(|v| v.checked_add(s))
        .and_then(|v| v.checked_mul(1000))
        .and_then(|v| v.checked_add(ms))
        .ok_or(TimestampError::Overflow)
}
