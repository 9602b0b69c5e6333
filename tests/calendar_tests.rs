use chrono::{Duration, TimeZone, Utc};
use focustime::calendar::caldav::{
    occurrence_id, parse_multistatus, split_occurrence_id, time_range_query,
};
use focustime::calendar::ics::{
    IcsEvent, escape_text, exclude_occurrence, override_occurrence, parse_duration, parse_events,
    render_calendar, rewrite_event, unescape_text,
};
use focustime::calendar::local_file::{CalendarFile, LocalFileCalendar, StoredEvent};
use focustime::calendar::{CalendarAdapter, CalendarType, EventUpdate, TimeRange};
use focustime::config::{Config, StoragePaths};
use focustime::errors::AppError;
use tempfile::TempDir;

const BERLIN_EVENT: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Example Corp//Calendar//EN\r\n\
BEGIN:VEVENT\r\n\
UID:focus-1@example.com\r\n\
SUMMARY:Focus\r\n\
\x20time\r\n\
DTSTART;TZID=Europe/Berlin:20260302T100000\r\n\
DURATION:PT45M\r\n\
LOCATION:Desk\\, 3rd floor\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
DESCRIPTION:Reminder\r\n\
TRIGGER:-PT10M\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

#[test]
fn test_parse_event_with_tzid_duration_and_alarm() {
    let events = parse_events(BERLIN_EVENT).unwrap();
    assert_eq!(events.len(), 1);

    let ev = &events[0];
    assert_eq!(ev.uid, "focus-1@example.com");
    assert_eq!(ev.summary, "Focustime");
    assert_eq!(ev.start, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    assert_eq!(ev.end, ev.start + Duration::minutes(45));
    assert_eq!(ev.reminder_in_minutes, 10);
}

#[test]
fn test_parse_utc_event_without_alarm() {
    let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:a\nSUMMARY:Focustime\n\
               DTSTART:20260302T100000Z\nDTEND:20260302T110000Z\nEND:VEVENT\nEND:VCALENDAR\n";
    let events = parse_events(ics).unwrap();

    assert_eq!(events[0].start, Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
    assert_eq!(events[0].end, Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap());
    assert_eq!(events[0].reminder_in_minutes, 0);
}

#[test]
fn test_parse_all_day_event() {
    let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:day\nSUMMARY:Focustime\n\
               DTSTART;VALUE=DATE:20260302\nDTEND;VALUE=DATE:20260303\nEND:VEVENT\nEND:VCALENDAR\n";
    let events = parse_events(ics).unwrap();

    assert_eq!(events[0].start, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
    assert_eq!(events[0].end - events[0].start, Duration::days(1));
}

#[test]
fn test_event_without_uid_is_rejected() {
    let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:Focustime\nDTSTART:20260302T100000Z\n\
               END:VEVENT\nEND:VCALENDAR\n";
    assert!(matches!(parse_events(ics), Err(AppError::Calendar(_))));
}

#[test]
fn test_parse_duration_forms() {
    assert_eq!(parse_duration("-PT15M"), Some(-900));
    assert_eq!(parse_duration("PT0S"), Some(0));
    assert_eq!(parse_duration("P1DT2H"), Some(93_600));
    assert_eq!(parse_duration("P2W"), Some(1_209_600));
    assert_eq!(parse_duration("15M"), None);
    assert_eq!(parse_duration("PT5"), None);
    assert_eq!(parse_duration("P1H"), None);
}

#[test]
fn test_parse_duration_out_of_range() {
    assert_eq!(parse_duration("P99999999999999W"), None);
    assert_eq!(parse_duration("PT9223372036854775807S"), Some(i64::MAX));
    assert_eq!(parse_duration("P9223372036854775807DT1S"), None);
}

#[test]
fn test_event_with_huge_duration_is_rejected() {
    let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:huge\nSUMMARY:Focustime\n\
               DTSTART:20260302T100000Z\nDURATION:PT9223372036854775807S\nEND:VEVENT\nEND:VCALENDAR\n";
    assert!(matches!(parse_events(ics), Err(AppError::Calendar(_))));
}

#[test]
fn test_huge_alarm_trigger_is_tolerated() {
    let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:alarm\nSUMMARY:Focustime\n\
               DTSTART:20260302T100000Z\nDTEND:20260302T110000Z\nBEGIN:VALARM\n\
               TRIGGER:-P99999999999999W\nEND:VALARM\nEND:VEVENT\nEND:VCALENDAR\n";
    assert_eq!(parse_events(ics).unwrap()[0].reminder_in_minutes, 0);
}

#[test]
fn test_text_escaping() {
    let raw = "Deep work; no calls, please\\";
    assert_eq!(unescape_text(&escape_text(raw)), raw);
    assert_eq!(escape_text("a,b"), "a\\,b");
}

#[test]
fn test_rendered_event_parses_back() {
    let event = IcsEvent {
        uid: "new-uid".into(),
        summary: "Focustime".into(),
        start: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap(),
        reminder_in_minutes: 15,
        recurrence_id: None,
    };
    let rendered = render_calendar(&event, event.start);

    assert!(rendered.contains("TRIGGER:-PT15M\r\n"));
    assert_eq!(parse_events(&rendered).unwrap(), vec![event]);
}

#[test]
fn test_rewrite_reminder_replaces_alarm() {
    let rewritten = rewrite_event(BERLIN_EVENT, &EventUpdate::reminder(15));

    assert!(!rewritten.contains("-PT10M"));
    assert_eq!(rewritten.matches("BEGIN:VALARM").count(), 1);
    assert!(rewritten.contains("LOCATION:Desk\\, 3rd floor"));

    let events = parse_events(&rewritten).unwrap();
    assert_eq!(events[0].reminder_in_minutes, 15);
    assert_eq!(events[0].end - events[0].start, Duration::minutes(45));
}

#[test]
fn test_rewrite_reminder_zero_drops_alarm() {
    let rewritten = rewrite_event(BERLIN_EVENT, &EventUpdate::reminder(0));

    assert!(!rewritten.contains("VALARM"));
    assert_eq!(parse_events(&rewritten).unwrap()[0].reminder_in_minutes, 0);
}

#[test]
fn test_rewrite_end_replaces_duration() {
    let end = Utc.with_ymd_and_hms(2026, 3, 2, 9, 20, 0).unwrap();
    let rewritten = rewrite_event(BERLIN_EVENT, &EventUpdate::end_at(end));

    assert!(!rewritten.contains("DURATION"));
    assert!(rewritten.contains("DTEND:20260302T092000Z"));

    let events = parse_events(&rewritten).unwrap();
    assert_eq!(events[0].end, end);
    assert_eq!(events[0].reminder_in_minutes, 10);
}

#[test]
fn test_parse_multistatus_with_prefixes() {
    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/calendars/me/focus/a.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"1"</d:getetag>
        <cal:calendar-data>BEGIN:VCALENDAR&#13;
SUMMARY:R&amp;D&#13;
END:VCALENDAR</cal:calendar-data>
      </d:prop>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/calendars/me/focus/</d:href>
    <d:propstat><d:prop><d:resourcetype/></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

    let resources = parse_multistatus(body).unwrap();

    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].href, "/calendars/me/focus/a.ics");
    assert!(resources[0].calendar_data.contains("SUMMARY:R&D\r\n"));
}

#[test]
fn test_parse_multistatus_cdata_without_prefix() {
    let body = "<multistatus xmlns=\"DAV:\"><response><href>/x.ics</href>\
                <propstat><prop><calendar-data xmlns=\"urn:ietf:params:xml:ns:caldav\">\
                <![CDATA[BEGIN:VCALENDAR\nEND:VCALENDAR]]></calendar-data></prop></propstat>\
                </response></multistatus>";

    let resources = parse_multistatus(body).unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].calendar_data, "BEGIN:VCALENDAR\nEND:VCALENDAR");
}

#[test]
fn test_parse_multistatus_rejects_malformed_xml() {
    let body = "<d:multistatus xmlns:d=\"DAV:\"><d:response><d:href>/a.ics</d:response>";
    assert!(matches!(parse_multistatus(body), Err(AppError::Calendar(_))));
}

// ------------------------------------------------------------
// Recurring events
// ------------------------------------------------------------

const DAILY_SERIES: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:daily@example.com\r\n\
SUMMARY:Focustime\r\n\
DTSTART:20260302T090000Z\r\n\
DTEND:20260302T100000Z\r\n\
RRULE:FREQ=DAILY\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

#[test]
fn test_time_range_query_expands_recurrences() {
    let range = TimeRange {
        from: Utc.with_ymd_and_hms(2026, 3, 2, 5, 0, 0).unwrap(),
        to: Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap(),
    };
    let query = time_range_query(&range);

    assert!(query.contains(
        r#"<c:calendar-data><c:expand start="20260302T050000Z" end="20260302T130000Z"/></c:calendar-data>"#
    ));
    assert!(query.contains(r#"<c:time-range start="20260302T050000Z" end="20260302T130000Z"/>"#));
}

#[test]
fn test_expanded_occurrences_become_separate_events() {
    let body = "<d:multistatus xmlns:d=\"DAV:\" xmlns:c=\"urn:ietf:params:xml:ns:caldav\">\
                <d:response><d:href>/cal/daily.ics</d:href><d:propstat><d:prop>\
                <c:calendar-data><![CDATA[BEGIN:VCALENDAR\r\nVERSION:2.0\r\n\
                BEGIN:VEVENT\r\nUID:daily@example.com\r\nRECURRENCE-ID:20260302T090000Z\r\n\
                SUMMARY:Focustime\r\nDTSTART:20260302T090000Z\r\nDTEND:20260302T100000Z\r\n\
                END:VEVENT\r\n\
                BEGIN:VEVENT\r\nUID:daily@example.com\r\nRECURRENCE-ID:20260303T090000Z\r\n\
                SUMMARY:Focustime\r\nDTSTART:20260303T090000Z\r\nDTEND:20260303T100000Z\r\n\
                END:VEVENT\r\nEND:VCALENDAR\r\n]]></c:calendar-data>\
                </d:prop></d:propstat></d:response></d:multistatus>";

    let resources = parse_multistatus(body).unwrap();
    assert_eq!(resources.len(), 1);
    let events = parse_events(&resources[0].calendar_data).unwrap();
    assert_eq!(events.len(), 2);

    let range = TimeRange {
        from: Utc.with_ymd_and_hms(2026, 3, 2, 4, 0, 0).unwrap(),
        to: Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap(),
    };
    assert!(events.iter().all(|e| range.overlaps(e.start, e.end)));

    let ids: Vec<String> = events
        .iter()
        .map(|e| occurrence_id(&e.uid, e.recurrence_id))
        .collect();
    assert_eq!(
        ids,
        vec![
            "daily@example.com#20260302T090000Z",
            "daily@example.com#20260303T090000Z"
        ]
    );
    assert_eq!(
        split_occurrence_id(&ids[1]),
        ("daily@example.com", events[1].recurrence_id)
    );
    assert_eq!(split_occurrence_id("room#4"), ("room#4", None));
}

#[test]
fn test_override_occurrence_leaves_series_untouched() {
    let rid = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
    let occurrence = IcsEvent {
        uid: "daily@example.com".into(),
        summary: "Focustime".into(),
        start: rid,
        end: rid + Duration::minutes(20),
        reminder_in_minutes: 0,
        recurrence_id: Some(rid),
    };

    let once = override_occurrence(DAILY_SERIES, &occurrence, rid);
    let twice = override_occurrence(&once, &occurrence, rid);
    assert_eq!(once, twice);

    let events = parse_events(&twice).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].end - events[0].start, Duration::hours(1));
    assert!(events[0].recurrence_id.is_none());
    assert_eq!(events[1].recurrence_id, Some(rid));
    assert_eq!(events[1].end, rid + Duration::minutes(20));
    assert!(twice.trim_end().ends_with("END:VCALENDAR"));
}

#[test]
fn test_exclude_occurrence_adds_exdate() {
    let rid = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
    let occurrence = IcsEvent {
        uid: "daily@example.com".into(),
        summary: "Focustime".into(),
        start: rid,
        end: rid + Duration::minutes(20),
        reminder_in_minutes: 0,
        recurrence_id: Some(rid),
    };
    let with_override = override_occurrence(DAILY_SERIES, &occurrence, rid);

    let excluded = exclude_occurrence(&with_override, rid);
    assert!(excluded.contains("EXDATE:20260303T090000Z\r\nEND:VEVENT"));
    assert!(!excluded.contains("RECURRENCE-ID"));
    assert_eq!(parse_events(&excluded).unwrap().len(), 1);
}

#[test]
fn test_time_range_around_clamps_huge_window() {
    let dir = TempDir::new().unwrap();
    let paths = StoragePaths::resolve(Some(dir.path()));
    let mut config = Config::new_default(CalendarType::LocalFile, &paths);
    config.calendar_look_back_hours = u32::MAX;
    config.calendar_look_ahead_hours = u32::MAX;

    let now = Utc::now();
    let range = TimeRange::around(now, &config);
    assert!(range.from < now && now < range.to);
}

// ------------------------------------------------------------
// Local file calendar
// ------------------------------------------------------------

fn local_calendar(dir: &TempDir) -> LocalFileCalendar {
    let paths = StoragePaths::resolve(Some(dir.path()));
    let config = Config::new_default(CalendarType::LocalFile, &paths);
    LocalFileCalendar::from_config(config, &paths)
}

#[test]
fn test_local_file_filters_subject_and_range() {
    let dir = TempDir::new().unwrap();
    let mut calendar = local_calendar(&dir);
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();

    let stored = |id: &str, subject: &str, start_h: i64| StoredEvent {
        id: id.into(),
        subject: subject.into(),
        start: now + Duration::hours(start_h),
        end: now + Duration::hours(start_h) + Duration::minutes(30),
        reminder_in_minutes: 15,
    };
    CalendarFile {
        events: vec![
            stored("later", "Focustime", 2),
            stored("meeting", "Weekly sync", 0),
            stored("now", "Focustime", 0),
            stored("far", "Focustime", 48),
        ],
    }
    .write(calendar.path())
    .unwrap();

    let range = TimeRange {
        from: now - Duration::hours(5),
        to: now + Duration::hours(3),
    };
    let ids: Vec<String> = calendar
        .get_events(Some(range))
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();

    assert_eq!(ids, vec!["now", "later"]);
}

#[test]
fn test_local_file_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let mut calendar = local_calendar(&dir);

    assert!(calendar.check_connection_and_credentials().is_ok());
    assert!(calendar.get_events(None).unwrap().is_empty());
}

#[test]
fn test_local_file_create_update_remove() {
    let dir = TempDir::new().unwrap();
    let mut calendar = local_calendar(&dir);
    let now = Utc::now();

    let created = calendar
        .create_event(now, now + Duration::minutes(20))
        .unwrap();
    assert_eq!(created.reminder_in_minutes, 15);

    calendar
        .update_event(&created, &EventUpdate::end_at(now + Duration::minutes(5)))
        .unwrap();
    let events = calendar.get_events(None).unwrap();
    assert_eq!(events[0].end, now + Duration::minutes(5));

    calendar.remove_event(&created).unwrap();
    assert!(calendar.get_events(None).unwrap().is_empty());
    assert!(matches!(
        calendar.remove_event(&created),
        Err(AppError::EventNotFound(_))
    ));
}
