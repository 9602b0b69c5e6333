//! Outlook 365 adapter using the Microsoft Graph calendar REST API.
//!
//! The access token is obtained outside the app (Azure app registration,
//! device-code or browser flow) and kept in the keyring.

use super::credentials::KeyringCredentialsStore;
use super::{CalendarAdapter, EventUpdate, FocusTimeEvent, TimeRange, prompt_line, sort_by_start};
use crate::config::{AdapterConfiguration, Config};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::BufRead;
use url::Url;

pub const TOKEN_ENV_VAR: &str = "FOCUSTIME_OUTLOOK_TOKEN";
const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0/";
const GRAPH_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CalendarList {
    value: Vec<GraphCalendar>,
}

#[derive(Debug, Deserialize)]
struct GraphCalendar {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    value: Vec<GraphEvent>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphDateTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

impl GraphDateTime {
    fn utc(dt: DateTime<Utc>) -> Self {
        Self {
            date_time: dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: "UTC".to_string(),
        }
    }

    /// Requests ask Graph for UTC, so the value carries no offset.
    fn to_utc(&self) -> AppResult<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&self.date_time, GRAPH_DATE_FORMAT)
            .map_err(|e| AppError::Calendar(format!("invalid Graph date '{}': {e}", self.date_time)))?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}

#[derive(Debug, Deserialize)]
struct GraphEvent {
    id: String,
    subject: Option<String>,
    start: GraphDateTime,
    end: GraphDateTime,
    #[serde(rename = "isReminderOn", default)]
    is_reminder_on: bool,
    #[serde(rename = "reminderMinutesBeforeStart", default)]
    reminder_minutes_before_start: u32,
}

#[derive(Debug, Default, Serialize)]
struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<GraphDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<GraphDateTime>,
    #[serde(rename = "isReminderOn", skip_serializing_if = "Option::is_none")]
    is_reminder_on: Option<bool>,
    #[serde(rename = "reminderMinutesBeforeStart", skip_serializing_if = "Option::is_none")]
    reminder_minutes_before_start: Option<u32>,
    #[serde(rename = "showAs", skip_serializing_if = "Option::is_none")]
    show_as: Option<&'static str>,
}

impl EventPatch {
    fn from_update(update: &EventUpdate) -> Self {
        Self {
            start: update.start.map(GraphDateTime::utc),
            end: update.end.map(GraphDateTime::utc),
            is_reminder_on: update.reminder_in_minutes.map(|m| m > 0),
            reminder_minutes_before_start: update.reminder_in_minutes,
            ..Self::default()
        }
    }
}

pub struct Outlook365Adapter {
    config: Config,
    client: Client,
    credentials: KeyringCredentialsStore,
    calendar_name: Option<String>,
    calendar_id: Option<String>,
    access_token: Option<String>,
}

impl Outlook365Adapter {
    pub fn new(config: Config) -> Self {
        let calendar_name = match &config.adapter_configuration {
            Some(AdapterConfiguration::Outlook365 { calendar_name, .. }) => {
                Some(calendar_name.clone())
            }
            _ => None,
        };
        Self {
            config,
            client: Client::new(),
            credentials: KeyringCredentialsStore::new("outlook365"),
            calendar_name,
            calendar_id: None,
            access_token: None,
        }
    }

    fn endpoint(path: &str) -> AppResult<Url> {
        Url::parse(GRAPH_API_BASE)
            .and_then(|base| base.join(path))
            .map_err(|e| AppError::Calendar(format!("invalid Graph URL for '{path}': {e}")))
    }

    fn token(&mut self) -> AppResult<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let payload = self
            .credentials
            .load()?
            .ok_or_else(|| AppError::Credential("Unable to load auth token".into()))?;
        let stored: StoredToken = serde_json::from_str(&payload)
            .map_err(|e| AppError::Credential(format!("stored auth token is invalid: {e}")))?;
        self.access_token = Some(stored.access_token.clone());
        Ok(stored.access_token)
    }

    fn authorized(&mut self, builder: RequestBuilder) -> AppResult<RequestBuilder> {
        let token = self.token()?;
        Ok(builder
            .bearer_auth(token)
            .header("Prefer", "outlook.timezone=\"UTC\""))
    }

    fn check_status(response: Response, action: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Credential(format!(
                "{action}: Microsoft Graph rejected the auth token (http {})",
                status.as_u16()
            )),
            _ => AppError::Calendar(format!(
                "{action}: Microsoft Graph error http {}; body={body}",
                status.as_u16()
            )),
        })
    }

    fn list_calendars(&mut self) -> AppResult<Vec<GraphCalendar>> {
        let request = self.authorized(self.client.get(Self::endpoint("me/calendars")?))?;
        let list: CalendarList = Self::check_status(request.send()?, "listing calendars")?.json()?;
        Ok(list.value)
    }

    fn calendar_id(&mut self) -> AppResult<String> {
        if let Some(id) = &self.calendar_id {
            return Ok(id.clone());
        }
        let name = self.calendar_name.clone().ok_or_else(|| {
            AppError::Config("Cannot reach the calendar, Outlook configuration is missing".into())
        })?;
        let id = self
            .list_calendars()?
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .ok_or_else(|| AppError::Calendar(format!("calendar '{name}' does not exist")))?;
        self.calendar_id = Some(id.clone());
        Ok(id)
    }

    fn event_endpoint(id: &str) -> AppResult<Url> {
        let mut url = Self::endpoint("me/events")?;
        url.path_segments_mut()
            .map_err(|_| AppError::Calendar("Graph URL cannot be a base".into()))?
            .push(id);
        Ok(url)
    }

    fn calendar_endpoint(calendar_id: &str, leaf: &str) -> AppResult<Url> {
        let mut url = Self::endpoint("me/calendars")?;
        url.path_segments_mut()
            .map_err(|_| AppError::Calendar("Graph URL cannot be a base".into()))?
            .push(calendar_id)
            .push(leaf);
        Ok(url)
    }

    fn to_focus_time_event(event: GraphEvent) -> AppResult<FocusTimeEvent> {
        Ok(FocusTimeEvent {
            start: event.start.to_utc()?,
            end: event.end.to_utc()?,
            reminder_in_minutes: if event.is_reminder_on {
                event.reminder_minutes_before_start
            } else {
                0
            },
            id: event.id,
        })
    }
}

impl CalendarAdapter for Outlook365Adapter {
    fn authenticate(&mut self, input: &mut dyn BufRead) -> AppResult<Option<AdapterConfiguration>> {
        let client_id = prompt_line(input, "Provide the Client ID of your Azure App registration")?;
        let token = match env::var(TOKEN_ENV_VAR) {
            Ok(t) if !t.is_empty() => t,
            _ => prompt_line(input, "Paste an access token with the Calendars.ReadWrite scope")?,
        };
        if client_id.is_empty() || token.is_empty() {
            println!("Client ID and access token are required - aborting ...");
            return Ok(None);
        }
        self.access_token = Some(token.clone());

        println!("Retrieving the list of calendars ...");
        let calendars = self.list_calendars()?;
        let calendar_name = match calendars.as_slice() {
            [] => {
                println!("Your account does not have any calendars - aborting ...");
                return Ok(None);
            }
            [only] => {
                println!(
                    "Found only one calendar named '{}', which will be chosen",
                    only.name
                );
                only.name.clone()
            }
            many => {
                let names: Vec<&str> = many.iter().map(|c| c.name.as_str()).collect();
                let chosen = prompt_line(
                    input,
                    &format!(
                        "Please provide the name of your calendar ({})",
                        names.join(", ")
                    ),
                )?;
                if !names.contains(&chosen.as_str()) {
                    println!("Unknown calendar '{chosen}' - aborting ...");
                    return Ok(None);
                }
                chosen
            }
        };

        let payload = serde_json::to_string(&StoredToken {
            access_token: token,
        })?;
        self.credentials.save(&payload)?;
        self.calendar_name = Some(calendar_name.clone());
        self.calendar_id = None;

        Ok(Some(AdapterConfiguration::Outlook365 {
            client_id,
            calendar_name,
        }))
    }

    fn check_connection_and_credentials(&mut self) -> AppResult<()> {
        self.calendar_id()?;
        Ok(())
    }

    fn get_events(&mut self, range: Option<TimeRange>) -> AppResult<Vec<FocusTimeEvent>> {
        let range = range.unwrap_or_else(|| TimeRange::around(Utc::now(), &self.config));
        let calendar_id = self.calendar_id()?;
        let name = self.config.focustime_event_name.clone();

        let mut url = Self::calendar_endpoint(&calendar_id, "calendarView")?;
        url.query_pairs_mut()
            .append_pair("startDateTime", &range.from.to_rfc3339())
            .append_pair("endDateTime", &range.to.to_rfc3339())
            .append_pair("$filter", &format!("subject eq '{}'", name.replace('\'', "''")))
            .append_pair("$orderby", "start/dateTime")
            .append_pair("$top", "100");

        let mut events = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(page_url) = next.take() {
            let request = self.authorized(self.client.get(&page_url))?;
            let page: EventList = Self::check_status(request.send()?, "listing events")?.json()?;
            for event in page.value {
                if event.subject.as_deref() == Some(name.as_str()) {
                    events.push(Self::to_focus_time_event(event)?);
                }
            }
            next = page.next_link;
        }

        sort_by_start(&mut events);
        Ok(events)
    }

    fn create_event(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<FocusTimeEvent> {
        let calendar_id = self.calendar_id()?;
        let reminder = self.config.desired_reminder_minutes();
        let body = EventPatch {
            subject: Some(self.config.focustime_event_name.clone()),
            show_as: Some("busy"),
            ..EventPatch::from_update(&EventUpdate {
                start: Some(from),
                end: Some(to),
                reminder_in_minutes: Some(reminder),
            })
        };

        let url = Self::calendar_endpoint(&calendar_id, "events")?;
        let request = self.authorized(self.client.post(url).json(&body))?;
        let created: GraphEvent = Self::check_status(request.send()?, "creating event")?.json()?;
        Self::to_focus_time_event(created)
    }

    fn update_event(&mut self, event: &FocusTimeEvent, update: &EventUpdate) -> AppResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let url = Self::event_endpoint(&event.id)?;
        let request = self.authorized(self.client.patch(url).json(&EventPatch::from_update(update)))?;
        let response = request.send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::EventNotFound(event.id.clone()));
        }
        Self::check_status(response, "updating event")?;
        Ok(())
    }

    fn remove_event(&mut self, event: &FocusTimeEvent) -> AppResult<()> {
        let url = Self::event_endpoint(&event.id)?;
        let request = self.authorized(self.client.delete(url))?;
        let response = request.send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::EventNotFound(event.id.clone()));
        }
        Self::check_status(response, "removing event")?;
        Ok(())
    }
}
