//! Time utilities: human readable durations and local time formatting.

use chrono::{DateTime, Duration, Local, Utc};

fn unit(value: i64, name: &str) -> String {
    if value == 1 {
        format!("{value} {name}")
    } else {
        format!("{value} {name}s")
    }
}

/// Days, hours and minutes of `duration`, e.g. "1 hour 5 minutes".
/// Seconds are dropped; anything shorter than a minute is "below 1 minute".
pub fn human_readable_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let days = total_minutes / 1_440;
    let hours = (total_minutes % 1_440) / 60;
    let minutes = total_minutes % 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(v, _)| *v > 0)
        .map(|(v, n)| unit(v, n))
        .collect();

    if parts.is_empty() {
        "below 1 minute".to_string()
    } else {
        parts.join(" ")
    }
}

/// `HH:MM` in the machine's local time zone.
pub fn local_hhmm(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%H:%M").to_string()
}
