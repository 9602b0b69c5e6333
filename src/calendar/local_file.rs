//! A calendar kept in a JSON file on disk.
//!
//! Useful without network access and as the backend of the end-to-end tests:
//! other tools (or tests) can add events with arbitrary subjects and
//! reminders, and the app sees them exactly like remote events.

use super::{CalendarAdapter, EventUpdate, FocusTimeEvent, TimeRange, sort_by_start};
use crate::config::{AdapterConfiguration, Config, StoragePaths};
use crate::errors::{AppError, AppResult};
use crate::utils::path::expand_tilde;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub reminder_in_minutes: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CalendarFile {
    #[serde(default)]
    pub events: Vec<StoredEvent>,
}

impl CalendarFile {
    /// A missing file is an empty calendar.
    pub fn read(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // atomic replace
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

pub struct LocalFileCalendar {
    config: Config,
    path: PathBuf,
}

impl LocalFileCalendar {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { config, path }
    }

    pub fn from_config(config: Config, paths: &StoragePaths) -> Self {
        let path = match &config.adapter_configuration {
            Some(AdapterConfiguration::LocalFile { path }) => expand_tilde(path),
            _ => paths.local_calendar_file(),
        };
        Self::new(config, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modify<F>(&self, id: &str, f: F) -> AppResult<()>
    where
        F: FnOnce(&mut Vec<StoredEvent>, usize),
    {
        let mut file = CalendarFile::read(&self.path)?;
        let idx = file
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::EventNotFound(id.to_string()))?;
        f(&mut file.events, idx);
        file.write(&self.path)
    }
}

impl CalendarAdapter for LocalFileCalendar {
    fn authenticate(&mut self, _input: &mut dyn BufRead) -> AppResult<Option<AdapterConfiguration>> {
        if !self.path.exists() {
            CalendarFile::default().write(&self.path)?;
        }
        Ok(Some(AdapterConfiguration::LocalFile {
            path: self.path.to_string_lossy().to_string(),
        }))
    }

    fn check_connection_and_credentials(&mut self) -> AppResult<()> {
        CalendarFile::read(&self.path)
            .map(|_| ())
            .map_err(|e| AppError::Calendar(format!("{}: {}", self.path.display(), e)))
    }

    fn get_events(&mut self, range: Option<TimeRange>) -> AppResult<Vec<FocusTimeEvent>> {
        let range = range.unwrap_or_else(|| TimeRange::around(Utc::now(), &self.config));
        let file = CalendarFile::read(&self.path)?;

        let mut events: Vec<FocusTimeEvent> = file
            .events
            .into_iter()
            .filter(|e| e.subject == self.config.focustime_event_name)
            .filter(|e| range.overlaps(e.start, e.end))
            .map(|e| FocusTimeEvent {
                id: e.id,
                start: e.start,
                end: e.end,
                reminder_in_minutes: e.reminder_in_minutes,
            })
            .collect();
        sort_by_start(&mut events);
        Ok(events)
    }

    fn create_event(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<FocusTimeEvent> {
        let mut file = CalendarFile::read(&self.path)?;
        let stored = StoredEvent {
            id: uuid::Uuid::new_v4().to_string(),
            subject: self.config.focustime_event_name.clone(),
            start: from,
            end: to,
            reminder_in_minutes: self.config.desired_reminder_minutes(),
        };
        file.events.push(stored.clone());
        file.write(&self.path)?;

        Ok(FocusTimeEvent {
            id: stored.id,
            start: stored.start,
            end: stored.end,
            reminder_in_minutes: stored.reminder_in_minutes,
        })
    }

    fn update_event(&mut self, event: &FocusTimeEvent, update: &EventUpdate) -> AppResult<()> {
        self.modify(&event.id, |events, idx| {
            let stored = &mut events[idx];
            if let Some(start) = update.start {
                stored.start = start;
            }
            if let Some(end) = update.end {
                stored.end = end;
            }
            if let Some(m) = update.reminder_in_minutes {
                stored.reminder_in_minutes = m;
            }
        })
    }

    fn remove_event(&mut self, event: &FocusTimeEvent) -> AppResult<()> {
        self.modify(&event.id, |events, idx| {
            events.remove(idx);
        })
    }
}
