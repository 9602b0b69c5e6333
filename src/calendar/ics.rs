//! iCalendar (RFC 5545) glue for the CalDAV adapter.
//!
//! Parsing goes through the `ical` crate; only what focus time blockers need
//! is extracted: UID, SUMMARY, DTSTART, DTEND/DURATION, RECURRENCE-ID and the
//! first VALARM trigger. Writing stays line based so that unknown properties
//! of an existing resource survive a rewrite.

use super::EventUpdate;
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ical::IcalParser;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;

const PRODID: &str = "-//FocusTimeApp//focustime//EN";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One VEVENT as far as the app cares about it. Expanded occurrences of a
/// recurring event carry their `recurrence_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsEvent {
    pub uid: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reminder_in_minutes: u32,
    pub recurrence_id: Option<DateTime<Utc>>,
}

pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format(UTC_FORMAT).to_string()
}

pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, UTC_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn format_trigger(minutes: u32) -> String {
    if minutes == 0 {
        "PT0S".to_string()
    } else {
        format!("-PT{minutes}M")
    }
}

fn alarm_lines(minutes: u32) -> [String; 5] {
    [
        "BEGIN:VALARM".to_string(),
        "ACTION:DISPLAY".to_string(),
        "DESCRIPTION:Reminder".to_string(),
        format!("TRIGGER:{}", format_trigger(minutes)),
        "END:VALARM".to_string(),
    ]
}

pub fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') | Some('N') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn event_lines(event: &IcsEvent, stamp: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}", event.uid),
    ];
    if let Some(rid) = event.recurrence_id {
        lines.push(format!("RECURRENCE-ID:{}", format_utc(rid)));
    }
    lines.extend([
        format!("DTSTAMP:{}", format_utc(stamp)),
        format!("DTSTART:{}", format_utc(event.start)),
        format!("DTEND:{}", format_utc(event.end)),
        format!("SUMMARY:{}", escape_text(&event.summary)),
        "TRANSP:OPAQUE".to_string(),
    ]);
    if event.reminder_in_minutes > 0 {
        lines.extend(alarm_lines(event.reminder_in_minutes));
    }
    lines.push("END:VEVENT".to_string());
    lines
}

fn join_lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

/// Serialize a complete VCALENDAR holding `event`.
pub fn render_calendar(event: &IcsEvent, stamp: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODID}"),
    ];
    lines.extend(event_lines(event, stamp));
    lines.push("END:VCALENDAR".to_string());
    join_lines(lines)
}

/// Join folded continuation lines.
pub fn unfold(ics: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in ics.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = line.strip_prefix([' ', '\t'])
            && let Some(last) = lines.last_mut()
        {
            last.push_str(rest);
            continue;
        }
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    lines
}

/// A content line: `NAME;PARAM=V:VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl ContentLine {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl From<&Property> for ContentLine {
    fn from(p: &Property) -> Self {
        Self {
            name: p.name.to_ascii_uppercase(),
            params: p
                .params
                .iter()
                .flatten()
                .map(|(k, values)| {
                    (
                        k.to_ascii_uppercase(),
                        values.join(",").trim_matches('"').to_string(),
                    )
                })
                .collect(),
            value: p.value.clone().unwrap_or_default(),
        }
    }
}

/// Split a raw line for the line based rewriters.
pub fn parse_content_line(line: &str) -> Option<ContentLine> {
    // the first colon outside double quotes separates name/params from value
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    let idx = split_at?;
    let (head, value) = (&line[..idx], &line[idx + 1..]);

    let mut parts = head.split(';');
    let name = parts.next()?.trim().to_ascii_uppercase();
    let params = parts
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((k.to_ascii_uppercase(), v.trim_matches('"').to_string()))
        })
        .collect();

    Some(ContentLine {
        name,
        params,
        value: value.to_string(),
    })
}

/// Parse DATE / DATE-TIME values (UTC, TZID-qualified, floating or all-day).
pub fn parse_date_time(line: &ContentLine) -> AppResult<DateTime<Utc>> {
    let value = line.value.trim();
    let invalid = || AppError::Calendar(format!("invalid {} value '{}'", line.name, value));

    let is_date = line
        .param("VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || value.len() == 8;
    if is_date {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())?;
        let naive = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if value.ends_with('Z') {
        return parse_utc(value).ok_or_else(invalid);
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
    if let Some(tzid) = line.param("TZID")
        && let Ok(tz) = tzid.parse::<chrono_tz::Tz>()
    {
        return tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(invalid);
    }

    // floating time, or a TZID chrono-tz does not know (e.g. Windows zone names)
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Parse an RFC 5545 DURATION (`-PT15M`, `P1DT2H`, `P2W`) into seconds.
/// `None` for malformed or out of range values.
pub fn parse_duration(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, rest) = match s.as_bytes().first()? {
        b'-' => (-1, &s[1..]),
        b'+' => (1, &s[1..]),
        _ => (1, s),
    };
    let rest = rest.strip_prefix('P')?;

    let mut total: i64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => number.push(c),
            unit => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                let unit_seconds = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(n.checked_mul(unit_seconds)?)?;
            }
        }
    }
    if !number.is_empty() {
        return None;
    }
    total.checked_mul(sign)
}

#[derive(Default)]
struct PartialEvent {
    uid: Option<String>,
    summary: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    duration: Option<String>,
    recurrence_id: Option<DateTime<Utc>>,
}

/// Parse every VEVENT of one or more VCALENDAR documents.
pub fn parse_events(ics: &str) -> AppResult<Vec<IcsEvent>> {
    let mut events = Vec::new();
    for calendar in IcalParser::new(ics.as_bytes()) {
        let calendar =
            calendar.map_err(|e| AppError::Calendar(format!("invalid iCalendar data: {e}")))?;
        for event in &calendar.events {
            events.push(convert_event(event)?);
        }
    }
    Ok(events)
}

fn convert_event(event: &IcalEvent) -> AppResult<IcsEvent> {
    let mut ev = PartialEvent::default();
    for property in &event.properties {
        let line = ContentLine::from(property);
        match line.name.as_str() {
            "UID" => ev.uid = Some(line.value.trim().to_string()),
            "SUMMARY" => ev.summary = unescape_text(&line.value),
            "DTSTART" => ev.start = Some(parse_date_time(&line)?),
            "DTEND" => ev.end = Some(parse_date_time(&line)?),
            "DURATION" => ev.duration = Some(line.value.trim().to_string()),
            "RECURRENCE-ID" => ev.recurrence_id = Some(parse_date_time(&line)?),
            _ => {}
        }
    }

    let trigger = event.alarms.iter().find_map(|alarm| {
        alarm
            .properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case("TRIGGER"))
    });
    let reminder = match trigger {
        Some(p) => reminder_from_trigger(&ContentLine::from(p), ev.start)?,
        None => 0,
    };

    finish_event(ev, reminder)
}

fn reminder_from_trigger(trigger: &ContentLine, start: Option<DateTime<Utc>>) -> AppResult<u32> {
    let seconds_before = if trigger
        .param("VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("DATE-TIME"))
    {
        match start {
            Some(start) => (start - parse_date_time(trigger)?).num_seconds(),
            None => 0,
        }
    } else {
        parse_duration(&trigger.value)
            .and_then(i64::checked_neg)
            .unwrap_or(0)
    };
    Ok(u32::try_from(seconds_before.max(0) / 60).unwrap_or(u32::MAX))
}

fn finish_event(ev: PartialEvent, reminder_in_minutes: u32) -> AppResult<IcsEvent> {
    let uid = ev
        .uid
        .ok_or_else(|| AppError::Calendar("VEVENT without UID".into()))?;
    let start = ev
        .start
        .ok_or_else(|| AppError::Calendar(format!("VEVENT {uid} without DTSTART")))?;
    let end = match (ev.end, ev.duration) {
        (Some(end), _) => end,
        (None, Some(raw)) => parse_duration(&raw)
            .and_then(Duration::try_seconds)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| AppError::Calendar(format!("VEVENT {uid} has an invalid DURATION '{raw}'")))?,
        (None, None) => start,
    };

    Ok(IcsEvent {
        uid,
        summary: ev.summary,
        start,
        end,
        reminder_in_minutes,
        recurrence_id: ev.recurrence_id,
    })
}

/// Rewrite an existing calendar resource, changing only what `update` sets,
/// in every VEVENT it holds.
///
/// A reminder update drops every VALARM of the event and, for a non-zero
/// reminder, appends a single display alarm.
pub fn rewrite_event(ics: &str, update: &EventUpdate) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_event = false;
    let mut in_alarm = false;
    let mut skipping_alarm = false;

    for raw in unfold(ics) {
        let parsed = parse_content_line(&raw);
        let (name, value) = match &parsed {
            Some(l) => (l.name.as_str(), l.value.trim().to_ascii_uppercase()),
            None => ("", String::new()),
        };

        if skipping_alarm {
            if name == "END" && value == "VALARM" {
                skipping_alarm = false;
            }
            continue;
        }

        match (name, value.as_str()) {
            ("BEGIN", "VEVENT") => in_event = true,
            ("BEGIN", "VALARM") if in_event => {
                if update.reminder_in_minutes.is_some() {
                    skipping_alarm = true;
                    continue;
                }
                in_alarm = true;
            }
            ("END", "VALARM") => in_alarm = false,
            ("END", "VEVENT") if in_event => {
                if let Some(m) = update.reminder_in_minutes
                    && m > 0
                {
                    out.extend(alarm_lines(m));
                }
                in_event = false;
            }
            ("DTSTART", _) if in_event && !in_alarm => {
                if let Some(start) = update.start {
                    out.push(format!("DTSTART:{}", format_utc(start)));
                    continue;
                }
            }
            ("DTEND", _) | ("DURATION", _) if in_event && !in_alarm => {
                if let Some(end) = update.end {
                    out.push(format!("DTEND:{}", format_utc(end)));
                    continue;
                }
            }
            _ => {}
        }
        out.push(raw);
    }

    join_lines(out)
}

// ------------------------------------------------------------
// Single occurrences of recurring events
// ------------------------------------------------------------

enum Segment {
    Line(String),
    Event(Vec<String>),
}

fn segments(ics: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut current: Option<Vec<String>> = None;
    for raw in unfold(ics) {
        let upper = raw.trim().to_ascii_uppercase();
        match current.as_mut() {
            None if upper == "BEGIN:VEVENT" => current = Some(vec![raw]),
            None => out.push(Segment::Line(raw)),
            Some(block) => {
                block.push(raw);
                if upper == "END:VEVENT"
                    && let Some(block) = current.take()
                {
                    out.push(Segment::Event(block));
                }
            }
        }
    }
    if let Some(block) = current {
        out.extend(block.into_iter().map(Segment::Line));
    }
    out
}

fn flatten(segments: Vec<Segment>) -> String {
    let mut lines = Vec::new();
    for segment in segments {
        match segment {
            Segment::Line(line) => lines.push(line),
            Segment::Event(block) => lines.extend(block),
        }
    }
    join_lines(lines)
}

/// First top-level property `name` of a VEVENT block, outside its alarms.
fn block_property(block: &[String], name: &str) -> Option<ContentLine> {
    let mut depth = 0;
    for raw in block.iter().skip(1) {
        let Some(line) = parse_content_line(raw) else {
            continue;
        };
        match line.name.as_str() {
            "BEGIN" => depth += 1,
            "END" if depth > 0 => depth -= 1,
            n if depth == 0 && n == name => return Some(line),
            _ => {}
        }
    }
    None
}

fn block_recurrence_id(block: &[String]) -> Option<DateTime<Utc>> {
    block_property(block, "RECURRENCE-ID").and_then(|l| parse_date_time(&l).ok())
}

/// Store `occurrence` as an override instance of its recurring series,
/// replacing a previous override of the same occurrence.
pub fn override_occurrence(ics: &str, occurrence: &IcsEvent, stamp: DateTime<Utc>) -> String {
    let mut segs: Vec<Segment> = segments(ics)
        .into_iter()
        .filter(|s| match s {
            Segment::Event(block) => {
                occurrence.recurrence_id.is_none()
                    || block_recurrence_id(block) != occurrence.recurrence_id
            }
            Segment::Line(_) => true,
        })
        .collect();

    let end_idx = segs
        .iter()
        .rposition(|s| matches!(s, Segment::Line(l) if l.trim().eq_ignore_ascii_case("END:VCALENDAR")))
        .unwrap_or(segs.len());
    segs.insert(end_idx, Segment::Event(event_lines(occurrence, stamp)));
    flatten(segs)
}

/// Remove one occurrence from a recurring series: drop its override and
/// exclude it from the master event.
pub fn exclude_occurrence(ics: &str, recurrence_id: DateTime<Utc>) -> String {
    let segs = segments(ics)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Event(block) if block_recurrence_id(&block) == Some(recurrence_id) => None,
            Segment::Event(mut block) if block_property(&block, "RRULE").is_some() => {
                let at = block.len().saturating_sub(1);
                block.insert(at, format!("EXDATE:{}", format_utc(recurrence_id)));
                Some(Segment::Event(block))
            }
            other => Some(other),
        })
        .collect();
    flatten(segs)
}
