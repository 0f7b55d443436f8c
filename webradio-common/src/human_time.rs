//! Track duration formatting
//!
//! Durations shown in directory listings and `file_info` events use a compact
//! clock format: `mm:ss` below one hour, `hh:mm:ss` from one hour on.

/// Seconds per hour
const SECS_PER_HOUR: u64 = 3600;

/// Format a duration in whole seconds as `mm:ss` or `hh:mm:ss`.
///
/// # Examples
///
/// ```
/// use webradio_common::human_time::format_duration;
///
/// assert_eq!(format_duration(0), "00:00");
/// assert_eq!(format_duration(185), "03:05");
/// assert_eq!(format_duration(3661), "01:01:01");
/// ```
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / SECS_PER_HOUR;
    let mins = (seconds % SECS_PER_HOUR) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
