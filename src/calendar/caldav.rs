//! CalDAV adapter (RFC 4791) on top of reqwest's blocking client.
//!
//! The user configures the URL of one calendar collection. Events are
//! fetched with a `calendar-query` REPORT and written back as whole iCalendar
//! resources with PUT.

use super::credentials::KeyringCredentialsStore;
use super::ics::{self, IcsEvent};
use super::{CalendarAdapter, EventUpdate, FocusTimeEvent, TimeRange, prompt_line, sort_by_start};
use crate::config::{AdapterConfiguration, Config};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::env;
use std::io::BufRead;
use url::Url;

pub const PASSWORD_ENV_VAR: &str = "FOCUSTIME_CALDAV_PASSWORD";

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><d:resourcetype/><d:displayname/><c:supported-calendar-component-set/></d:prop>
</d:propfind>"#;

/// `calendar-query` REPORT for the events overlapping `range`. Recurring
/// series are expanded server side into their single occurrences.
pub fn time_range_query(range: &TimeRange) -> String {
    let (from, to) = (ics::format_utc(range.from), ics::format_utc(range.to));
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data><c:expand start="{from}" end="{to}"/></c:calendar-data>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:time-range start="{from}" end="{to}"/>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#
    )
}

fn uid_query(uid: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><d:getetag/><c:calendar-data/></d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:prop-filter name="UID">
          <c:text-match collation="i;octet">{}</c:text-match>
        </c:prop-filter>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#,
        quick_xml::escape::escape(uid)
    )
}

/// Id of one occurrence of a recurring series: `<uid>#<recurrence-id>`.
pub fn occurrence_id(uid: &str, recurrence_id: Option<DateTime<Utc>>) -> String {
    match recurrence_id {
        Some(rid) => format!("{uid}#{}", ics::format_utc(rid)),
        None => uid.to_string(),
    }
}

/// Inverse of [`occurrence_id`]. UIDs that merely contain `#` stay intact.
pub fn split_occurrence_id(id: &str) -> (&str, Option<DateTime<Utc>>) {
    if let Some((uid, rid)) = id.rsplit_once('#')
        && let Some(rid) = ics::parse_utc(rid)
    {
        return (uid, Some(rid));
    }
    (id, None)
}

/// One `<response>` of a multistatus body that carried calendar data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResource {
    pub href: String,
    pub calendar_data: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Href,
    CalendarData,
}

fn xml_error(e: impl std::fmt::Display) -> AppError {
    AppError::Calendar(format!("invalid multistatus response: {e}"))
}

/// Extract href + calendar-data pairs from a 207 multistatus body,
/// whatever namespace prefixes the server chose.
pub fn parse_multistatus(body: &str) -> AppResult<Vec<DavResource>> {
    let mut reader = Reader::from_str(body);
    let mut resources = Vec::new();
    let mut field = Field::None;
    let mut href: Option<String> = None;
    let mut current_href = String::new();
    let mut data = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"response" => {
                    href = None;
                    data.clear();
                }
                b"href" if href.is_none() => {
                    current_href.clear();
                    field = Field::Href;
                }
                b"calendar-data" => field = Field::CalendarData,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"href" if field == Field::Href => {
                    href = Some(current_href.trim().to_string());
                    field = Field::None;
                }
                b"calendar-data" => field = Field::None,
                b"response" => {
                    let calendar_data = data.trim();
                    if let Some(href) = href.take()
                        && !calendar_data.is_empty()
                    {
                        resources.push(DavResource {
                            href,
                            calendar_data: calendar_data.to_string(),
                        });
                    }
                    data.clear();
                }
                _ => {}
            },
            Event::Text(t) if field != Field::None => {
                let raw = std::str::from_utf8(&t).map_err(xml_error)?;
                let text = quick_xml::escape::unescape(raw).map_err(xml_error)?;
                match field {
                    Field::Href => current_href.push_str(&text),
                    _ => data.push_str(&text),
                }
            }
            Event::CData(c) if field != Field::None => {
                let text = std::str::from_utf8(&c).map_err(xml_error)?;
                match field {
                    Field::Href => current_href.push_str(text),
                    _ => data.push_str(text),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(resources)
}

pub struct CalDavAdapter {
    config: Config,
    client: Client,
    credentials: KeyringCredentialsStore,
    calendar_url: Option<Url>,
    username: String,
    password: String,
}

impl CalDavAdapter {
    pub fn new(config: Config) -> Self {
        let (calendar_url, username) = match &config.adapter_configuration {
            Some(AdapterConfiguration::CalDav {
                calendar_url,
                username,
            }) => (Url::parse(&with_trailing_slash(calendar_url)).ok(), username.clone()),
            _ => (None, String::new()),
        };

        Self {
            config,
            client: Client::new(),
            credentials: KeyringCredentialsStore::new("caldav"),
            calendar_url,
            username,
            password: String::new(),
        }
    }

    fn calendar_url(&self) -> AppResult<&Url> {
        self.calendar_url.as_ref().ok_or_else(|| {
            AppError::Config("Cannot reach the calendar, CalDAV configuration is missing".into())
        })
    }

    fn load_credentials(&mut self) -> AppResult<()> {
        if !self.password.is_empty() {
            return Ok(());
        }
        self.password = self
            .credentials
            .load()?
            .ok_or_else(|| AppError::Credential("CalDAV credentials are missing".into()))?;
        Ok(())
    }

    fn request(&self, method: Method, url: Url) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    fn dav_method(name: &str) -> AppResult<Method> {
        Method::from_bytes(name.as_bytes()).map_err(|e| AppError::Other(e.to_string()))
    }

    fn check_status(response: Response, action: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(Self::http_error(status, action, &body))
    }

    fn http_error(status: StatusCode, action: &str, body: &str) -> AppError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Credential(format!(
                "{action}: the CalDAV server rejected the credentials (http {})",
                status.as_u16()
            )),
            _ if body.trim().is_empty() => {
                AppError::Calendar(format!("{action}: http {}", status.as_u16()))
            }
            _ => AppError::Calendar(format!("{action}: http {}; body={body}", status.as_u16())),
        }
    }

    fn report(&self, body: String) -> AppResult<Vec<DavResource>> {
        let url = self.calendar_url()?.clone();
        let response = self
            .request(Self::dav_method("REPORT")?, url)
            .header("Depth", "1")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body)
            .send()?;
        let text = Self::check_status(response, "calendar query")?.text()?;
        parse_multistatus(&text)
    }

    fn propfind(&self, url: Url) -> AppResult<()> {
        let response = self
            .request(Self::dav_method("PROPFIND")?, url)
            .header("Depth", "0")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()?;
        Self::check_status(response, "calendar lookup")?;
        Ok(())
    }

    fn resolve_href(&self, href: &str) -> AppResult<Url> {
        self.calendar_url()?
            .join(href)
            .map_err(|e| AppError::Calendar(format!("invalid href '{href}': {e}")))
    }

    /// Fetch the resource holding the event with `uid`.
    fn find_resource(&self, uid: &str) -> AppResult<DavResource> {
        self.report(uid_query(uid))?
            .into_iter()
            .find(|r| {
                ics::parse_events(&r.calendar_data)
                    .map(|events| events.iter().any(|e| e.uid == uid))
                    .unwrap_or(false)
            })
            .ok_or_else(|| AppError::EventNotFound(uid.to_string()))
    }

    fn put(&self, url: Url, body: String, create: bool) -> AppResult<()> {
        let mut request = self
            .request(Method::PUT, url)
            .header("Content-Type", "text/calendar; charset=utf-8");
        if create {
            request = request.header("If-None-Match", "*");
        }
        let response = request.body(body).send()?;
        Self::check_status(response, "saving event")?;
        Ok(())
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

impl CalendarAdapter for CalDavAdapter {
    fn authenticate(&mut self, input: &mut dyn BufRead) -> AppResult<Option<AdapterConfiguration>> {
        let url = prompt_line(input, "Provide the URL of your CalDAV calendar collection")?;
        let calendar_url = Url::parse(&with_trailing_slash(&url))
            .map_err(|e| AppError::Config(format!("invalid calendar URL '{url}': {e}")))?;
        self.username = prompt_line(input, "Please provide your username")?;
        self.password = match env::var(PASSWORD_ENV_VAR) {
            Ok(pw) if !pw.is_empty() => pw,
            _ => prompt_line(input, "Please provide your password")?,
        };
        if self.username.is_empty() || self.password.is_empty() {
            println!("Username and password are required - aborting ...");
            return Ok(None);
        }

        if let Err(e) = self.propfind(calendar_url.clone()) {
            println!("Unable to authenticate: {e}");
            return Ok(None);
        }

        self.credentials.save(&self.password)?;
        self.calendar_url = Some(calendar_url.clone());
        Ok(Some(AdapterConfiguration::CalDav {
            calendar_url: calendar_url.to_string(),
            username: self.username.clone(),
        }))
    }

    fn check_connection_and_credentials(&mut self) -> AppResult<()> {
        let url = self.calendar_url()?.clone();
        self.load_credentials()?;
        self.propfind(url)
    }

    fn get_events(&mut self, range: Option<TimeRange>) -> AppResult<Vec<FocusTimeEvent>> {
        self.load_credentials()?;
        let range = range.unwrap_or_else(|| TimeRange::around(Utc::now(), &self.config));

        let mut events = Vec::new();
        for resource in self.report(time_range_query(&range))? {
            for e in ics::parse_events(&resource.calendar_data)? {
                if e.summary != self.config.focustime_event_name || !range.overlaps(e.start, e.end) {
                    continue;
                }
                events.push(FocusTimeEvent {
                    id: occurrence_id(&e.uid, e.recurrence_id),
                    start: e.start,
                    end: e.end,
                    reminder_in_minutes: e.reminder_in_minutes,
                });
            }
        }
        sort_by_start(&mut events);
        Ok(events)
    }

    fn create_event(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<FocusTimeEvent> {
        self.load_credentials()?;
        let event = IcsEvent {
            uid: uuid::Uuid::new_v4().to_string(),
            summary: self.config.focustime_event_name.clone(),
            start: from,
            end: to,
            reminder_in_minutes: self.config.desired_reminder_minutes(),
            recurrence_id: None,
        };
        let url = self.resolve_href(&format!("{}.ics", event.uid))?;
        self.put(url, ics::render_calendar(&event, Utc::now()), true)?;

        Ok(FocusTimeEvent {
            id: event.uid,
            start: event.start,
            end: event.end,
            reminder_in_minutes: event.reminder_in_minutes,
        })
    }

    fn update_event(&mut self, event: &FocusTimeEvent, update: &EventUpdate) -> AppResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.load_credentials()?;
        let (uid, recurrence_id) = split_occurrence_id(&event.id);
        let resource = self.find_resource(uid)?;

        // moving one occurrence must not move the whole series
        let body = match recurrence_id {
            Some(rid) if update.start.is_some() || update.end.is_some() => {
                let mut updated = event.clone();
                update.apply_to(&mut updated);
                let occurrence = IcsEvent {
                    uid: uid.to_string(),
                    summary: self.config.focustime_event_name.clone(),
                    start: updated.start,
                    end: updated.end,
                    reminder_in_minutes: updated.reminder_in_minutes,
                    recurrence_id: Some(rid),
                };
                ics::override_occurrence(&resource.calendar_data, &occurrence, Utc::now())
            }
            _ => ics::rewrite_event(&resource.calendar_data, update),
        };
        let url = self.resolve_href(&resource.href)?;
        self.put(url, body, false)
    }

    fn remove_event(&mut self, event: &FocusTimeEvent) -> AppResult<()> {
        self.load_credentials()?;
        let (uid, recurrence_id) = split_occurrence_id(&event.id);
        let resource = self.find_resource(uid)?;
        let url = self.resolve_href(&resource.href)?;

        if let Some(rid) = recurrence_id {
            let body = ics::exclude_occurrence(&resource.calendar_data, rid);
            return self.put(url, body, false);
        }

        let response = self.request(Method::DELETE, url).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::EventNotFound(event.id.clone()));
        }
        Self::check_status(response, "removing event")?;
        Ok(())
    }
}
