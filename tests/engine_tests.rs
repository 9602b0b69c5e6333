use chrono::{DateTime, Duration, TimeZone, Utc};
use focustime::calendar::{
    CalendarAdapter, CalendarType, EventUpdate, FocusTimeEvent, TimeRange, active_event,
};
use focustime::config::{AdapterConfiguration, Config, StoragePaths};
use focustime::core::session::SessionLogic;
use focustime::core::sync::{SyncEngine, Transition, decide};
use focustime::db::log::ActivityLog;
use focustime::errors::{AppError, AppResult};
use focustime::execution::CommandExecutor;
use focustime::notification::OsNotification;
use focustime::state::{InMemoryMarker, MarkerStore, SessionState};
use std::cell::RefCell;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

// ------------------------------------------------------------
// In-memory collaborators
// ------------------------------------------------------------

#[derive(Default)]
struct MemoryCalendar {
    events: Vec<FocusTimeEvent>,
    failing_updates: HashSet<String>,
    next_id: usize,
    reminder: u32,
}

impl MemoryCalendar {
    fn with(events: Vec<FocusTimeEvent>) -> Self {
        Self {
            events,
            reminder: 15,
            ..Self::default()
        }
    }
}

impl CalendarAdapter for MemoryCalendar {
    fn authenticate(&mut self, _input: &mut dyn BufRead) -> AppResult<Option<AdapterConfiguration>> {
        Ok(None)
    }

    fn check_connection_and_credentials(&mut self) -> AppResult<()> {
        Ok(())
    }

    fn get_events(&mut self, range: Option<TimeRange>) -> AppResult<Vec<FocusTimeEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| range.is_none_or(|r| r.overlaps(e.start, e.end)))
            .cloned()
            .collect())
    }

    fn create_event(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<FocusTimeEvent> {
        self.next_id += 1;
        let event = FocusTimeEvent {
            id: format!("created-{}", self.next_id),
            start: from,
            end: to,
            reminder_in_minutes: self.reminder,
        };
        self.events.push(event.clone());
        Ok(event)
    }

    fn update_event(&mut self, event: &FocusTimeEvent, update: &EventUpdate) -> AppResult<()> {
        if self.failing_updates.contains(&event.id) {
            return Err(AppError::Calendar(format!("update of {} rejected", event.id)));
        }
        let stored = self
            .events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| AppError::EventNotFound(event.id.clone()))?;
        update.apply_to(stored);
        Ok(())
    }

    fn remove_event(&mut self, event: &FocusTimeEvent) -> AppResult<()> {
        let before = self.events.len();
        self.events.retain(|e| e.id != event.id);
        if self.events.len() == before {
            return Err(AppError::EventNotFound(event.id.clone()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingExecutor {
    calls: RefCell<Vec<String>>,
    fail_on: Option<String>,
}

impl CommandExecutor for RecordingExecutor {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn execute_commands(&self, commands: &[String], dnd_profile_name: &str) -> AppResult<()> {
        for command in commands {
            self.calls
                .borrow_mut()
                .push(format!("{command}@{dnd_profile_name}"));
            if self.fail_on.as_deref() == Some(command.as_str()) {
                return Err(AppError::CommandFailed {
                    command: command.clone(),
                    status: "exit status: 1".into(),
                });
            }
        }
        Ok(())
    }

    fn is_dnd_active(&self) -> AppResult<bool> {
        Ok(false)
    }

    fn set_dnd_active(&self, _active: bool, _dnd_profile_name: &str) -> AppResult<()> {
        Ok(())
    }

    fn is_dnd_helper_installed(&self) -> AppResult<bool> {
        Ok(true)
    }

    fn install_dnd_helpers(&self) -> AppResult<()> {
        Ok(())
    }

    fn uninstall_dnd_helpers(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<String>>,
}

impl OsNotification for RecordingNotifier {
    fn send_notification(&self, _title: &str, message: &str) -> AppResult<()> {
        self.sent.borrow_mut().push(message.to_string());
        Ok(())
    }
}

// ------------------------------------------------------------
// Fixtures
// ------------------------------------------------------------

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

fn event(id: &str, start_min: i64, end_min: i64, reminder: u32) -> FocusTimeEvent {
    FocusTimeEvent {
        id: id.to_string(),
        start: now() + Duration::minutes(start_min),
        end: now() + Duration::minutes(end_min),
        reminder_in_minutes: reminder,
    }
}

fn config() -> Config {
    let paths = StoragePaths::resolve(Some(Path::new("unused")));
    let mut cfg = Config::new_default(CalendarType::LocalFile, &paths);
    cfg.start_commands = vec!["dnd-start".into(), "echo start".into()];
    cfg.stop_commands = vec!["dnd-stop".into()];
    cfg.dnd_profile_name = "deep-work".into();
    cfg
}

struct Harness {
    config: Config,
    calendar: MemoryCalendar,
    executor: RecordingExecutor,
    notifier: RecordingNotifier,
    marker: InMemoryMarker,
    log: ActivityLog,
}

impl Harness {
    fn new(events: Vec<FocusTimeEvent>, ongoing: bool) -> Self {
        Self {
            config: config(),
            calendar: MemoryCalendar::with(events),
            executor: RecordingExecutor::default(),
            notifier: RecordingNotifier::default(),
            marker: InMemoryMarker::new(ongoing),
            log: ActivityLog::disabled(),
        }
    }

    fn engine(&mut self) -> SyncEngine<'_> {
        SyncEngine::new(
            &self.config,
            &mut self.calendar,
            &self.executor,
            &self.notifier,
            &mut self.marker,
            &self.log,
        )
    }

    fn sync_at(&mut self, at: DateTime<Utc>) -> AppResult<Transition> {
        self.engine().run(at).map(|r| r.transition)
    }

    fn calls(&self) -> Vec<String> {
        self.executor.calls.borrow().clone()
    }

    fn ongoing(&self) -> bool {
        self.marker.ongoing_focustime_markerfile_exists().unwrap()
    }
}

// ------------------------------------------------------------
// Transition table
// ------------------------------------------------------------

#[test]
fn test_transition_table() {
    assert_eq!(decide(SessionState::Idle, true), Transition::Start);
    assert_eq!(decide(SessionState::Idle, false), Transition::AlreadyIdle);
    assert_eq!(decide(SessionState::Active, true), Transition::AlreadyActive);
    assert_eq!(decide(SessionState::Active, false), Transition::Stop);
}

#[test]
fn test_idle_with_active_event_starts() {
    let mut h = Harness::new(vec![event("e1", -1, 5, 15)], false);

    assert_eq!(h.sync_at(now()).unwrap(), Transition::Start);
    assert_eq!(h.calls(), vec!["dnd-start@deep-work", "echo start@deep-work"]);
    assert!(h.ongoing());
}

#[test]
fn test_idle_without_event_does_nothing() {
    let mut h = Harness::new(vec![event("future", 60, 120, 15)], false);

    assert_eq!(h.sync_at(now()).unwrap(), Transition::AlreadyIdle);
    assert!(h.calls().is_empty());
    assert!(!h.ongoing());
    assert_eq!(h.marker.writes(), 0);
}

#[test]
fn test_active_with_event_does_nothing() {
    let mut h = Harness::new(vec![event("e1", -10, 10, 15)], true);

    assert_eq!(h.sync_at(now()).unwrap(), Transition::AlreadyActive);
    assert!(h.calls().is_empty());
    assert_eq!(h.marker.writes(), 0);
}

#[test]
fn test_active_without_event_stops() {
    let mut h = Harness::new(vec![], true);

    assert_eq!(h.sync_at(now()).unwrap(), Transition::Stop);
    assert_eq!(h.calls(), vec!["dnd-stop@deep-work"]);
    assert!(!h.ongoing());
}

#[test]
fn test_repeated_sync_is_idempotent() {
    let mut h = Harness::new(vec![event("e1", -1, 5, 15)], false);

    let transitions: Vec<Transition> = (0..3).map(|_| h.sync_at(now()).unwrap()).collect();

    assert_eq!(
        transitions,
        vec![Transition::Start, Transition::AlreadyActive, Transition::AlreadyActive]
    );
    assert_eq!(h.calls().len(), 2);
    assert_eq!(h.marker.writes(), 1);
}

#[test]
fn test_start_then_end_of_event_runs_each_phase_once() {
    let mut h = Harness::new(vec![event("e1", 0, 30, 15)], false);

    assert_eq!(h.sync_at(now()).unwrap(), Transition::Start);
    assert_eq!(h.sync_at(now() + Duration::minutes(10)).unwrap(), Transition::AlreadyActive);
    assert_eq!(h.sync_at(now() + Duration::minutes(31)).unwrap(), Transition::Stop);
    assert_eq!(h.sync_at(now() + Duration::minutes(32)).unwrap(), Transition::AlreadyIdle);

    assert_eq!(
        h.calls(),
        vec!["dnd-start@deep-work", "echo start@deep-work", "dnd-stop@deep-work"]
    );
}

// ------------------------------------------------------------
// Boundaries and selection
// ------------------------------------------------------------

#[test]
fn test_event_starting_now_is_active() {
    let mut h = Harness::new(vec![event("e1", 0, 30, 15)], false);
    assert_eq!(h.sync_at(now()).unwrap(), Transition::Start);
}

#[test]
fn test_event_ending_now_is_active() {
    let mut h = Harness::new(vec![event("e1", -30, 0, 15)], true);
    assert_eq!(h.sync_at(now()).unwrap(), Transition::AlreadyActive);

    assert_eq!(h.sync_at(now() + Duration::seconds(1)).unwrap(), Transition::Stop);
}

#[test]
fn test_overlapping_events_resolve_deterministically() {
    let events = vec![
        event("b", -5, 20, 15),
        event("late", -1, 10, 15),
        event("a", -5, 20, 15),
        event("short", -5, 5, 15),
    ];
    let mut reversed = events.clone();
    reversed.reverse();

    let chosen = active_event(&events, now()).map(|e| e.id.clone());
    let chosen_reversed = active_event(&reversed, now()).map(|e| e.id.clone());

    assert_eq!(chosen.as_deref(), Some("short"));
    assert_eq!(chosen, chosen_reversed);

    let ties = vec![event("b", -5, 20, 15), event("a", -5, 20, 15)];
    assert_eq!(active_event(&ties, now()).map(|e| e.id.as_str()), Some("a"));
}

// ------------------------------------------------------------
// Failure handling
// ------------------------------------------------------------

#[test]
fn test_failing_start_command_commits_marker_and_propagates() {
    let mut h = Harness::new(vec![event("e1", -1, 30, 15)], false);
    h.executor.fail_on = Some("dnd-start".into());

    let err = h.sync_at(now()).unwrap_err();

    assert!(matches!(err, AppError::CommandFailed { ref command, .. } if command == "dnd-start"));
    assert!(h.ongoing());
    // the rest of the list is not attempted
    assert_eq!(h.calls(), vec!["dnd-start@deep-work"]);
    assert!(h.notifier.sent.borrow().is_empty());

    // and the start phase is never retried
    assert_eq!(h.sync_at(now()).unwrap(), Transition::AlreadyActive);
    assert_eq!(h.calls().len(), 1);
}

#[test]
fn test_failing_stop_command_clears_marker_and_propagates() {
    let mut h = Harness::new(vec![], true);
    h.executor.fail_on = Some("dnd-stop".into());

    assert!(h.sync_at(now()).is_err());
    assert!(!h.ongoing());
    assert_eq!(h.sync_at(now()).unwrap(), Transition::AlreadyIdle);
}

#[test]
fn test_calendar_failure_aborts_before_side_effects() {
    struct BrokenCalendar;
    impl CalendarAdapter for BrokenCalendar {
        fn authenticate(&mut self, _: &mut dyn BufRead) -> AppResult<Option<AdapterConfiguration>> {
            Ok(None)
        }
        fn check_connection_and_credentials(&mut self) -> AppResult<()> {
            Ok(())
        }
        fn get_events(&mut self, _: Option<TimeRange>) -> AppResult<Vec<FocusTimeEvent>> {
            Err(AppError::Calendar("offline".into()))
        }
        fn create_event(&mut self, _: DateTime<Utc>, _: DateTime<Utc>) -> AppResult<FocusTimeEvent> {
            Err(AppError::Calendar("offline".into()))
        }
        fn update_event(&mut self, _: &FocusTimeEvent, _: &EventUpdate) -> AppResult<()> {
            Err(AppError::Calendar("offline".into()))
        }
        fn remove_event(&mut self, _: &FocusTimeEvent) -> AppResult<()> {
            Err(AppError::Calendar("offline".into()))
        }
    }

    let cfg = config();
    let executor = RecordingExecutor::default();
    let notifier = RecordingNotifier::default();
    let mut marker = InMemoryMarker::new(true);
    let log = ActivityLog::disabled();
    let mut calendar = BrokenCalendar;

    let mut engine = SyncEngine::new(&cfg, &mut calendar, &executor, &notifier, &mut marker, &log);
    assert!(matches!(engine.run(now()), Err(AppError::Calendar(_))));
    drop(engine);

    assert!(executor.calls.borrow().is_empty());
    assert_eq!(marker.writes(), 0);
}

// ------------------------------------------------------------
// Reminder drift
// ------------------------------------------------------------

#[test]
fn test_reminder_drift_is_corrected_for_every_event() {
    let mut h = Harness::new(
        vec![event("active", -1, 30, 30), event("later", 60, 90, 0), event("ok", 120, 150, 15)],
        false,
    );

    let report = h.engine().run(now()).unwrap();

    assert_eq!(report.reminder_corrections.len(), 2);
    assert!(report.reminder_corrections.iter().all(|c| c.succeeded()));
    assert!(h.calendar.events.iter().all(|e| e.reminder_in_minutes == 15));
    assert_eq!(report.active_event.map(|e| e.reminder_in_minutes), Some(15));
}

#[test]
fn test_disabled_reminder_means_zero() {
    let mut h = Harness::new(vec![event("e1", 60, 90, 15)], false);
    h.config.set_event_reminder = false;

    h.sync_at(now()).unwrap();
    assert_eq!(h.calendar.events[0].reminder_in_minutes, 0);
}

#[test]
fn test_reminder_failure_does_not_abort_sync() {
    let mut h = Harness::new(vec![event("broken", -1, 30, 30), event("later", 60, 90, 5)], false);
    h.calendar.failing_updates.insert("broken".into());

    let report = h.engine().run(now()).unwrap();

    assert_eq!(report.transition, Transition::Start);
    let failed: Vec<&str> = report
        .reminder_corrections
        .iter()
        .filter(|c| !c.succeeded())
        .map(|c| c.event_id.as_str())
        .collect();
    assert_eq!(failed, vec!["broken"]);
    assert_eq!(h.calendar.events[1].reminder_in_minutes, 15);
    assert!(h.ongoing());
}

// ------------------------------------------------------------
// Notifications
// ------------------------------------------------------------

#[test]
fn test_notifications_follow_transitions() {
    let mut h = Harness::new(vec![event("e1", 0, 65, 15)], false);

    h.sync_at(now()).unwrap();
    h.sync_at(now()).unwrap();
    h.calendar.events.clear();
    h.sync_at(now()).unwrap();

    assert_eq!(
        *h.notifier.sent.borrow(),
        vec![
            "Focus time started, ends in 1 hour 5 minutes".to_string(),
            "Focus time ended".to_string()
        ]
    );
}

#[test]
fn test_notifications_can_be_disabled() {
    let mut h = Harness::new(vec![event("e1", 0, 30, 15)], false);
    h.config.show_notification = false;

    h.sync_at(now()).unwrap();
    assert!(h.notifier.sent.borrow().is_empty());
}

// ------------------------------------------------------------
// Sessions
// ------------------------------------------------------------

#[test]
fn test_session_start_creates_event_and_reconciles() {
    let mut h = Harness::new(vec![], false);
    let cfg = h.config.clone();

    let (created, report) = SessionLogic::start(&mut h.engine(), &cfg, 25, now()).unwrap();

    assert_eq!(created.start, now());
    assert_eq!(created.end, now() + Duration::minutes(25));
    assert_eq!(report.transition, Transition::Start);
    assert_eq!(h.calendar.events.len(), 1);
    assert!(h.ongoing());
}

#[test]
fn test_session_start_refuses_second_active_event() {
    let mut h = Harness::new(vec![event("e1", -5, 5, 15)], false);
    let cfg = h.config.clone();

    let err = SessionLogic::start(&mut h.engine(), &cfg, 25, now()).unwrap_err();

    assert!(matches!(err, AppError::SessionAlreadyActive));
    assert_eq!(h.calendar.events.len(), 1);
    assert!(h.calls().is_empty());
}

#[test]
fn test_session_stop_requires_active_event() {
    let mut h = Harness::new(vec![event("later", 30, 60, 15)], true);
    let cfg = h.config.clone();

    let err = SessionLogic::stop(&mut h.engine(), &cfg, now()).unwrap_err();

    assert!(matches!(err, AppError::NoActiveSession));
    assert_eq!(h.calendar.events[0], event("later", 30, 60, 15));
}

#[test]
fn test_session_stop_shortens_event_and_runs_stop_commands() {
    let mut h = Harness::new(vec![event("e1", -20, 40, 15)], true);
    let cfg = h.config.clone();

    let (stopped, report) = SessionLogic::stop(&mut h.engine(), &cfg, now()).unwrap();

    assert_eq!(stopped.end, now());
    assert_eq!(h.calendar.events[0].end, now());
    assert_eq!(report.transition, Transition::Stop);
    assert_eq!(h.calls(), vec!["dnd-stop@deep-work"]);
    assert!(!h.ongoing());
}

#[test]
fn test_calendar_round_trip() {
    let mut calendar = MemoryCalendar::with(vec![]);
    let created = calendar
        .create_event(now(), now() + Duration::minutes(30))
        .unwrap();

    let events = calendar.get_events(None).unwrap();
    assert_eq!(events, vec![created.clone()]);
    assert_eq!(events[0].reminder_in_minutes, 15);

    calendar.remove_event(&created).unwrap();
    assert!(calendar.get_events(None).unwrap().is_empty());
    assert!(matches!(
        calendar.remove_event(&created),
        Err(AppError::EventNotFound(_))
    ));
}

// ------------------------------------------------------------
// Helper processes
// ------------------------------------------------------------

#[cfg(unix)]
#[test]
fn test_run_with_input_feeds_stdin() {
    use focustime::execution::shell::run_with_input;

    assert!(run_with_input("cat", &[], "dnd on\n").is_ok());
}

#[cfg(unix)]
#[test]
fn test_run_with_input_reports_closed_stdin() {
    use focustime::execution::shell::run_with_input;

    // `true` exits without reading, so the 1 MiB write hits a closed pipe
    let input = "x".repeat(1 << 20);
    match run_with_input("true", &[], &input) {
        Err(AppError::CommandFailed { command, status }) => {
            assert_eq!(command, "true");
            assert!(status.starts_with("writing stdin"), "{status}");
        }
        other => panic!("expected a stdin failure, got {other:?}"),
    }
}
