//! Manual `start` / `stop`: change the calendar, then reconcile right away.

use crate::calendar::{EventUpdate, FocusTimeEvent, TimeRange, active_event};
use crate::config::Config;
use crate::core::sync::{SyncEngine, SyncReport};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};

/// Offset of the reconciliation that follows `stop`. The shortened event ends
/// exactly at the stop instant and the end boundary is inclusive, so the sync
/// has to look just past it.
const STOP_SETTLE_SECS: i64 = 1;

pub struct SessionLogic;

impl SessionLogic {
    /// Create a focus time event from `now` lasting `duration_minutes`.
    /// Fails without touching the calendar if one is already active.
    pub fn start(
        engine: &mut SyncEngine<'_>,
        config: &Config,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> AppResult<(FocusTimeEvent, SyncReport)> {
        let events = engine
            .calendar()
            .get_events(Some(TimeRange::around(now, config)))?;
        if active_event(&events, now).is_some() {
            return Err(AppError::SessionAlreadyActive);
        }

        let end = now + Duration::minutes(i64::from(duration_minutes));
        let created = engine.calendar().create_event(now, end)?;

        let report = engine.run(now)?;
        Ok((created, report))
    }

    /// End the active focus time event at `now`.
    /// Fails without touching the calendar if none is active.
    pub fn stop(
        engine: &mut SyncEngine<'_>,
        config: &Config,
        now: DateTime<Utc>,
    ) -> AppResult<(FocusTimeEvent, SyncReport)> {
        let events = engine
            .calendar()
            .get_events(Some(TimeRange::around(now, config)))?;
        let Some(active) = active_event(&events, now).cloned() else {
            return Err(AppError::NoActiveSession);
        };

        let update = EventUpdate::end_at(now);
        engine.calendar().update_event(&active, &update)?;

        let mut stopped = active;
        update.apply_to(&mut stopped);

        let report = engine.run(now + Duration::seconds(STOP_SETTLE_SECS))?;
        Ok((stopped, report))
    }
}
