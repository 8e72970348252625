//! Value decoding for transport.
//!
//! WAL positions (`pg_current_wal_lsn()` and friends) are reported by the
//! server as `XXXXXXXX/YYYYYYYY`. They are collapsed into a single `u64` so
//! the backend can graph them as a monotonically increasing counter.

use crate::model::MetricValue;

/// Decodes a raw cell.
///
/// - `None` stays `None`.
/// - `<hex>/<hex>`, ignoring surrounding whitespace, becomes
///   `Counter((high << 32) + low)`.
/// - Anything else is returned as `Raw`, untouched.
pub fn decode_value(raw: Option<&str>) -> Option<MetricValue> {
    let raw = raw?;
    match decode_lsn(raw.trim()) {
        Some(position) => Some(MetricValue::Counter(position)),
        None => Some(MetricValue::Raw(raw.to_string())),
    }
}

/// Parses `<hex>/<hex>` into `(high << 32) + low`.
///
/// Returns `None` if the string is not exactly two hex runs around one slash,
/// or if the result does not fit in a `u64`.
pub fn decode_lsn(s: &str) -> Option<u64> {
    let (high, low) = s.split_once('/')?;
    let high = parse_hex_run(high)?;
    let low = parse_hex_run(low)?;
    high.checked_mul(1 << 32)?.checked_add(low)
}

fn parse_hex_run(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}
