//! Calendar access: the focus time event model and the provider adapters.
//!
//! Each provider is one variant behind [`CalendarAdapter`]; the factory
//! [`create_calendar_adapter`] picks it from the configured calendar type.

pub mod caldav;
pub mod credentials;
pub mod ics;
pub mod local_file;
pub mod outlook365;
pub mod selection;

use crate::config::{AdapterConfiguration, Config, StoragePaths};
use crate::errors::AppResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;

pub use selection::active_event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum CalendarType {
    #[serde(rename = "Outlook365")]
    #[value(name = "outlook365")]
    Outlook365,
    #[serde(rename = "CalDAV")]
    #[value(name = "caldav")]
    CalDav,
    #[serde(rename = "LocalFile")]
    #[value(name = "local-file")]
    LocalFile,
}

impl fmt::Display for CalendarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalendarType::Outlook365 => "Outlook365",
            CalendarType::CalDav => "CalDAV",
            CalendarType::LocalFile => "LocalFile",
        };
        write!(f, "{s}")
    }
}

/// One calendar event recognized as a focus time blocker.
///
/// `start <= end` is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusTimeEvent {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reminder_in_minutes: u32,
}

impl FocusTimeEvent {
    /// Both boundaries are inclusive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        if now >= self.end {
            Duration::zero()
        } else {
            self.end - now
        }
    }
}

/// Partial update of an event: only the `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub reminder_in_minutes: Option<u32>,
}

impl EventUpdate {
    pub fn reminder(minutes: u32) -> Self {
        Self {
            reminder_in_minutes: Some(minutes),
            ..Self::default()
        }
    }

    pub fn end_at(end: DateTime<Utc>) -> Self {
        Self {
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.reminder_in_minutes.is_none()
    }

    /// Apply the update to a local copy of the event.
    pub fn apply_to(&self, event: &mut FocusTimeEvent) {
        if let Some(start) = self.start {
            event.start = start;
        }
        if let Some(end) = self.end {
            event.end = end;
        }
        if let Some(m) = self.reminder_in_minutes {
            event.reminder_in_minutes = m;
        }
    }
}

/// Calendar query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// The configured look-back / look-ahead window around `now`, clamped to
    /// the representable date range.
    pub fn around(now: DateTime<Utc>, config: &Config) -> Self {
        let hours = |h: u32| Duration::try_hours(i64::from(h)).unwrap_or(Duration::MAX);
        Self {
            from: now
                .checked_sub_signed(hours(config.calendar_look_back_hours))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            to: now
                .checked_add_signed(hours(config.calendar_look_ahead_hours))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.to && end >= self.from
    }
}

/// Capability interface every calendar provider implements.
pub trait CalendarAdapter {
    /// Interactively obtain and store credentials; returns the provider
    /// settings to persist, or `None` if the user aborted.
    fn authenticate(&mut self, input: &mut dyn BufRead) -> AppResult<Option<AdapterConfiguration>>;

    /// Fails if the calendar is unreachable or the stored credentials are invalid.
    fn check_connection_and_credentials(&mut self) -> AppResult<()>;

    /// Focus time events overlapping `range` (default: the configured window),
    /// sorted by ascending start.
    fn get_events(&mut self, range: Option<TimeRange>) -> AppResult<Vec<FocusTimeEvent>>;

    /// Create a focus time event carrying the configured reminder.
    fn create_event(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<FocusTimeEvent>;

    fn update_event(&mut self, event: &FocusTimeEvent, update: &EventUpdate) -> AppResult<()>;

    /// Fails with `EventNotFound` if the event no longer exists.
    fn remove_event(&mut self, event: &FocusTimeEvent) -> AppResult<()>;
}

/// Build the adapter matching the configured calendar type.
pub fn create_calendar_adapter(
    config: &Config,
    paths: &StoragePaths,
) -> AppResult<Box<dyn CalendarAdapter>> {
    let adapter: Box<dyn CalendarAdapter> = match config.calendar_type {
        CalendarType::Outlook365 => Box::new(outlook365::Outlook365Adapter::new(config.clone())),
        CalendarType::CalDav => Box::new(caldav::CalDavAdapter::new(config.clone())),
        CalendarType::LocalFile => Box::new(local_file::LocalFileCalendar::from_config(
            config.clone(),
            paths,
        )),
    };
    Ok(adapter)
}

pub(crate) fn sort_by_start(events: &mut [FocusTimeEvent]) {
    events.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Read one trimmed line after printing `question`.
pub(crate) fn prompt_line(input: &mut dyn BufRead, question: &str) -> AppResult<String> {
    println!("{question}");
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
