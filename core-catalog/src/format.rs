//! Display helpers for episode metadata

use tracing::warn;

/// Formats whole seconds as `mm:ss`, or `hh:mm:ss` from one hour up.
///
/// Hours are not wrapped at 24.
///
/// ```
/// use core_catalog::format_duration;
///
/// assert_eq!(format_duration(0), "00:00");
/// assert_eq!(format_duration(125), "02:05");
/// assert_eq!(format_duration(3661), "01:01:01");
/// ```
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Like [`format_duration`] for fractional or untrusted values.
///
/// Fractions are floored, non-positive values render as `00:00` and NaN as
/// `--:--`.
pub fn format_duration_secs(seconds: f64) -> String {
    if seconds.is_nan() {
        warn!(value = seconds, "Invalid duration value received");
        return "--:--".to_string();
    }
    if seconds <= 0.0 {
        return format_duration(0);
    }
    format_duration(seconds.floor() as u64)
}
