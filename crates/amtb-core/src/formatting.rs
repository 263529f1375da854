//! Formatting utilities (Telegram HTML escaping, durations, timestamps).

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Compact uptime-style duration, e.g. `2d 3h 4m 5s`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h {mins}m {secs}s");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

/// Time elapsed since `since`, formatted with [`format_duration`].
pub fn format_uptime(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_duration(now.signed_duration_since(since).num_seconds())
}

/// Render a timestamp in the configured zone with a strftime format string.
pub fn format_timestamp(ts: DateTime<Utc>, tz: Tz, format: &str) -> String {
    tz.from_utc_datetime(&ts.naive_utc())
        .format(format)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(-5), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(61), "1m 1s");
        assert_eq!(format_duration(3 * 3600 + 5), "3h 0m 5s");
        assert_eq!(format_duration(86400 + 60), "1d 0h 1m 0s");
    }

    #[test]
    fn formats_timestamps_in_zone() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            format_timestamp(ts, chrono_tz::Europe::Moscow, "%d/%m/%Y %H:%M:%S"),
            "01/05/2024 13:00:00"
        );
        assert_eq!(format_timestamp(ts, chrono_tz::UTC, "%H:%M"), "10:00");
    }
}
