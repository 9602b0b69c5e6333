//! Active-event selection.

use super::FocusTimeEvent;
use chrono::{DateTime, Utc};

/// The single focus time event active at `now`, if any.
///
/// `now` is captured once by the caller and used for every event. Overlapping
/// active events resolve to the earliest start, then the earliest end, then
/// the smallest id, so the result never depends on provider ordering.
pub fn active_event(events: &[FocusTimeEvent], now: DateTime<Utc>) -> Option<&FocusTimeEvent> {
    events
        .iter()
        .filter(|e| e.is_active_at(now))
        .min_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.end.cmp(&b.end))
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Events whose reminder differs from `desired_minutes`.
pub fn reminder_drift(
    events: &[FocusTimeEvent],
    desired_minutes: u32,
) -> impl Iterator<Item = &FocusTimeEvent> {
    events
        .iter()
        .filter(move |e| e.reminder_in_minutes != desired_minutes)
}
