//! The reconciler: converges the machine's focus time state to the calendar.
//!
//! | marker | active event | effect                          | marker after |
//! |--------|--------------|---------------------------------|--------------|
//! | idle   | yes          | run start commands, set marker  | active       |
//! | idle   | no           | none                            | idle         |
//! | active | yes          | none                            | active       |
//! | active | no           | run stop commands, clear marker | idle         |
//!
//! The marker is written even when a command of the list fails, then the
//! command error is returned. A later sync therefore never re-runs a start or
//! stop sequence that was already attempted.

use crate::calendar::selection::reminder_drift;
use crate::calendar::{CalendarAdapter, EventUpdate, FocusTimeEvent, TimeRange, active_event};
use crate::config::Config;
use crate::db::log::ActivityLog;
use crate::errors::AppResult;
use crate::execution::CommandExecutor;
use crate::notification::{NOTIFICATION_TITLE, OsNotification};
use crate::state::{MarkerStore, SessionState};
use crate::ui::messages::{info, warning};
use crate::utils::time::human_readable_duration;
use chrono::{DateTime, Utc};

pub const MSG_STARTING: &str = "Found a new focus time, calling start command(s) ...";
pub const MSG_ALREADY_ACTIVE: &str = "Focus time is already active. Exiting ...";
pub const MSG_STOPPING: &str = "No focus time is active, calling stop command(s) ...";
pub const MSG_ALREADY_IDLE: &str = "No focus time is active. Exiting ...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    AlreadyActive,
    Stop,
    AlreadyIdle,
}

impl Transition {
    pub fn message(self) -> &'static str {
        match self {
            Transition::Start => MSG_STARTING,
            Transition::AlreadyActive => MSG_ALREADY_ACTIVE,
            Transition::Stop => MSG_STOPPING,
            Transition::AlreadyIdle => MSG_ALREADY_IDLE,
        }
    }

    pub fn has_side_effects(self) -> bool {
        matches!(self, Transition::Start | Transition::Stop)
    }
}

/// The transition table.
pub fn decide(marker: SessionState, has_active_event: bool) -> Transition {
    match (marker, has_active_event) {
        (SessionState::Idle, true) => Transition::Start,
        (SessionState::Idle, false) => Transition::AlreadyIdle,
        (SessionState::Active, true) => Transition::AlreadyActive,
        (SessionState::Active, false) => Transition::Stop,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCorrection {
    pub event_id: String,
    pub from_minutes: u32,
    pub to_minutes: u32,
    /// `None` when the calendar accepted the update.
    pub error: Option<String>,
}

impl ReminderCorrection {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub transition: Transition,
    pub active_event: Option<FocusTimeEvent>,
    pub reminder_corrections: Vec<ReminderCorrection>,
}

pub struct SyncEngine<'a> {
    config: &'a Config,
    calendar: &'a mut dyn CalendarAdapter,
    executor: &'a dyn CommandExecutor,
    notifier: &'a dyn OsNotification,
    marker: &'a mut dyn MarkerStore,
    log: &'a ActivityLog,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        config: &'a Config,
        calendar: &'a mut dyn CalendarAdapter,
        executor: &'a dyn CommandExecutor,
        notifier: &'a dyn OsNotification,
        marker: &'a mut dyn MarkerStore,
        log: &'a ActivityLog,
    ) -> Self {
        Self {
            config,
            calendar,
            executor,
            notifier,
            marker,
            log,
        }
    }

    pub fn calendar(&mut self) -> &mut dyn CalendarAdapter {
        &mut *self.calendar
    }

    /// One reconciliation pass. `now` is used for every activity check.
    pub fn run(&mut self, now: DateTime<Utc>) -> AppResult<SyncReport> {
        let config = self.config;
        let mut events = self
            .calendar
            .get_events(Some(TimeRange::around(now, config)))?;

        let reminder_corrections = self.correct_reminders(&mut events);

        let state = self.marker.state()?;
        let active = active_event(&events, now).cloned();
        let transition = decide(state, active.is_some());

        info(transition.message());

        match transition {
            Transition::Start => {
                let remaining = active
                    .as_ref()
                    .map(|e| human_readable_duration(e.remaining_at(now)))
                    .unwrap_or_default();
                self.apply(
                    true,
                    &config.start_commands,
                    &format!("Focus time started, ends in {remaining}"),
                )?;
            }
            Transition::Stop => {
                self.apply(false, &config.stop_commands, "Focus time ended")?;
            }
            Transition::AlreadyActive | Transition::AlreadyIdle => {}
        }

        Ok(SyncReport {
            transition,
            active_event: active,
            reminder_corrections,
        })
    }

    /// Align every fetched event's reminder with the configuration. A failing
    /// update is recorded and the remaining events are still processed.
    fn correct_reminders(&mut self, events: &mut [FocusTimeEvent]) -> Vec<ReminderCorrection> {
        let desired = self.config.desired_reminder_minutes();
        let drifted: Vec<FocusTimeEvent> = reminder_drift(events, desired).cloned().collect();

        let mut corrections = Vec::with_capacity(drifted.len());
        for event in drifted {
            let update = EventUpdate::reminder(desired);
            let error = match self.calendar.update_event(&event, &update) {
                Ok(()) => {
                    if let Some(local) = events.iter_mut().find(|e| e.id == event.id) {
                        update.apply_to(local);
                    }
                    self.log.record(
                        "reminder_fix",
                        &event.id,
                        &format!(
                            "reminder {} -> {} minutes",
                            event.reminder_in_minutes, desired
                        ),
                    );
                    None
                }
                Err(e) => {
                    warning(format!(
                        "Could not adjust the reminder of focus time event {}: {}",
                        event.id, e
                    ));
                    self.log
                        .record("reminder_fix_failed", &event.id, &e.to_string());
                    Some(e.to_string())
                }
            };

            corrections.push(ReminderCorrection {
                event_id: event.id,
                from_minutes: event.reminder_in_minutes,
                to_minutes: desired,
                error,
            });
        }
        corrections
    }

    /// Run a command list, then commit the marker no matter how the commands
    /// went. A command error wins over a marker error.
    fn apply(&mut self, ongoing: bool, commands: &[String], notification: &str) -> AppResult<()> {
        let operation = if ongoing { "sync_start" } else { "sync_stop" };

        let executed = self
            .executor
            .execute_commands(commands, &self.config.dnd_profile_name);
        let committed = self.marker.set_ongoing_focustime(ongoing);

        if let Err(e) = executed {
            self.log.record("command_failed", operation, &e.to_string());
            if let Err(marker_err) = committed {
                warning(format!("Failed to update the focus time marker: {marker_err}"));
            }
            return Err(e);
        }
        committed?;

        self.log.record(
            operation,
            "",
            &format!("{} command(s) executed", commands.len()),
        );

        if self.config.show_notification {
            // best effort
            let _ = self
                .notifier
                .send_notification(NOTIFICATION_TITLE, notification);
        }
        Ok(())
    }
}
