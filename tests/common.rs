#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, Duration, Utc};
use focustime::calendar::CalendarType;
use focustime::calendar::local_file::{CalendarFile, StoredEvent};
use focustime::config::{Config, StoragePaths};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const EVENT_NAME: &str = "Focustime";

/// Binary invocation bound to `home`, in test mode and without colours.
pub fn ft(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("focustime");
    cmd.env("NO_COLOR", "1")
        .env_remove("FOCUSTIME_HOME")
        .arg("--home")
        .arg(home)
        .arg("--test");
    cmd
}

/// Shell command appending `word` to `file`; works with `sh -c` and `cmd /C`.
pub fn append_cmd(file: &Path, word: &str) -> String {
    format!("echo {} >> \"{}\"", word, file.display())
}

/// An isolated storage directory with a LocalFile calendar and a config whose
/// start/stop commands append to a trace file.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        let home = Self {
            dir: TempDir::new().expect("temp dir"),
        };
        home.write_config(|_| {});
        home
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> StoragePaths {
        StoragePaths::resolve(Some(self.path()))
    }

    pub fn trace_file(&self) -> PathBuf {
        self.path().join("trace.txt")
    }

    pub fn calendar_file(&self) -> PathBuf {
        self.paths().local_calendar_file()
    }

    pub fn default_config(&self) -> Config {
        let mut cfg = Config::new_default(CalendarType::LocalFile, &self.paths());
        cfg.start_commands = vec![append_cmd(&self.trace_file(), "start")];
        cfg.stop_commands = vec![append_cmd(&self.trace_file(), "stop")];
        cfg.show_notification = false;
        cfg
    }

    /// Store the default test config after applying `f` to it.
    pub fn write_config(&self, f: impl FnOnce(&mut Config)) {
        let mut cfg = self.default_config();
        f(&mut cfg);
        cfg.store(&self.paths()).expect("store config");
    }

    pub fn remove_config(&self) {
        fs::remove_file(self.paths().config_file()).expect("remove config");
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        CalendarFile::read(&self.calendar_file())
            .expect("read calendar")
            .events
    }

    pub fn set_events(&self, events: Vec<StoredEvent>) {
        CalendarFile { events }
            .write(&self.calendar_file())
            .expect("write calendar");
    }

    pub fn add_event(&self, event: StoredEvent) {
        let mut events = self.events();
        events.push(event);
        self.set_events(events);
    }

    pub fn marker_exists(&self) -> bool {
        self.paths().marker_file().exists()
    }

    /// How often `word` was written to the trace file.
    pub fn trace_count(&self, word: &str) -> usize {
        fs::read_to_string(self.trace_file())
            .unwrap_or_default()
            .lines()
            .filter(|l| l.trim() == word)
            .count()
    }
}

pub fn stored_event(
    id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reminder_in_minutes: u32,
) -> StoredEvent {
    StoredEvent {
        id: id.to_string(),
        subject: EVENT_NAME.to_string(),
        start,
        end,
        reminder_in_minutes,
    }
}

/// An event running from one minute ago for another `minutes`.
pub fn active_event(id: &str, minutes: i64) -> StoredEvent {
    let now = Utc::now();
    stored_event(id, now - Duration::minutes(1), now + Duration::minutes(minutes), 15)
}
