use crate::calendar::CalendarType;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub mod migrate; // use submodule at src/config/migrate.rs

pub const APP_NAME: &str = "FocusTimeApp";
pub const CONFIG_FILE_NAME: &str = "configuration.yaml";
pub const MARKER_FILE_NAME: &str = "start_command_was_recently_called";
pub const DATABASE_FILE_NAME: &str = "focustime.sqlite";
pub const LOCK_FILE_NAME: &str = "focustime.lock";
pub const LOCAL_CALENDAR_FILE_NAME: &str = "calendar.json";
pub const CONFIG_VERSION: u32 = 1;
/// Upper bound for `calendar_look_back_hours` / `calendar_look_ahead_hours` (one year).
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

/// Returns "-ci" when running inside CI, so automated runs never touch a
/// productive installation's files or keyring entries.
pub fn environment_suffix() -> &'static str {
    if env::var_os("CI").is_some() { "-ci" } else { "" }
}

/// Resolved on-disk locations of everything the app persists.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    dir: PathBuf,
}

impl StoragePaths {
    /// Use the override directory when given, otherwise the platform config dir.
    pub fn resolve(home_override: Option<&Path>) -> Self {
        let dir = match home_override {
            Some(p) => p.to_path_buf(),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(format!("{APP_NAME}{}", environment_suffix())),
        };
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn marker_file(&self) -> PathBuf {
        self.dir.join(MARKER_FILE_NAME)
    }

    pub fn database_file(&self) -> PathBuf {
        self.dir.join(DATABASE_FILE_NAME)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    pub fn local_calendar_file(&self) -> PathBuf {
        self.dir.join(LOCAL_CALENDAR_FILE_NAME)
    }

    pub fn ensure_dir(&self) -> AppResult<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Provider specific settings, discriminated by their field sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdapterConfiguration {
    Outlook365 {
        client_id: String,
        calendar_name: String,
    },
    CalDav {
        calendar_url: String,
        username: String,
    },
    LocalFile {
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub calendar_type: CalendarType,
    pub calendar_look_ahead_hours: u32,
    pub calendar_look_back_hours: u32,
    pub focustime_event_name: String,
    pub start_commands: Vec<String>,
    pub stop_commands: Vec<String>,
    pub dnd_profile_name: String,
    pub set_event_reminder: bool,
    pub event_reminder_time_minutes: u32,
    #[serde(default = "default_show_notification")]
    pub show_notification: bool,
    #[serde(default)]
    pub adapter_configuration: Option<AdapterConfiguration>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_show_notification() -> bool {
    true
}

fn default_dnd_profile_name() -> String {
    if cfg!(target_os = "windows") {
        "prio-only".to_string()
    } else {
        "focus-time-app".to_string()
    }
}

impl Config {
    /// A fresh configuration for the given calendar type, as written by `configure`.
    pub fn new_default(calendar_type: CalendarType, paths: &StoragePaths) -> Self {
        let adapter_configuration = match calendar_type {
            CalendarType::LocalFile => Some(AdapterConfiguration::LocalFile {
                path: paths.local_calendar_file().to_string_lossy().to_string(),
            }),
            _ => None,
        };

        Self {
            version: CONFIG_VERSION,
            calendar_type,
            calendar_look_ahead_hours: 3,
            calendar_look_back_hours: 5,
            focustime_event_name: "Focustime".to_string(),
            start_commands: vec!["dnd-start".to_string()],
            stop_commands: vec!["dnd-stop".to_string()],
            dnd_profile_name: default_dnd_profile_name(),
            set_event_reminder: true,
            event_reminder_time_minutes: 15,
            show_notification: default_show_notification(),
            adapter_configuration,
        }
    }

    /// Load and validate the configuration file.
    /// A missing file is reported as `ConfigMissing` so callers can show the
    /// fixed instructional message.
    pub fn load(paths: &StoragePaths) -> AppResult<Self> {
        let path = paths.config_file();
        if !path.exists() {
            return Err(AppError::ConfigMissing);
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn store(&self, paths: &StoragePaths) -> AppResult<()> {
        paths.ensure_dir()?;
        let yaml = serde_yaml::to_string(self)?;
        fs::write(paths.config_file(), yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.version != CONFIG_VERSION {
            return Err(AppError::Config(format!(
                "Detected invalid version {} of the configuration file. Supported versions are: {}",
                self.version, CONFIG_VERSION
            )));
        }
        if self.focustime_event_name.trim().is_empty() {
            return Err(AppError::Config(
                "focustime_event_name must not be empty".into(),
            ));
        }
        if self.dnd_profile_name.trim().is_empty() {
            return Err(AppError::Config("dnd_profile_name must not be empty".into()));
        }
        for (key, hours) in [
            ("calendar_look_back_hours", self.calendar_look_back_hours),
            ("calendar_look_ahead_hours", self.calendar_look_ahead_hours),
        ] {
            if hours > MAX_WINDOW_HOURS {
                return Err(AppError::Config(format!(
                    "{key} must be at most {MAX_WINDOW_HOURS}, got {hours}"
                )));
            }
        }

        match (&self.calendar_type, &self.adapter_configuration) {
            (_, None) => Ok(()),
            (
                CalendarType::Outlook365,
                Some(AdapterConfiguration::Outlook365 {
                    client_id,
                    calendar_name,
                }),
            ) => {
                if client_id.trim().is_empty() || calendar_name.trim().is_empty() {
                    return Err(AppError::Config(
                        "Outlook365 client_id and calendar_name must not be empty".into(),
                    ));
                }
                Ok(())
            }
            (
                CalendarType::CalDav,
                Some(AdapterConfiguration::CalDav {
                    calendar_url,
                    username,
                }),
            ) => {
                if calendar_url.trim().is_empty() || username.trim().is_empty() {
                    return Err(AppError::Config(
                        "CalDAV calendar_url and username must not be empty".into(),
                    ));
                }
                Ok(())
            }
            (CalendarType::LocalFile, Some(AdapterConfiguration::LocalFile { path })) => {
                if path.trim().is_empty() {
                    return Err(AppError::Config("LocalFile path must not be empty".into()));
                }
                Ok(())
            }
            (t, Some(_)) => Err(AppError::Config(format!(
                "adapter_configuration does not match calendar_type {}",
                t
            ))),
        }
    }

    /// Reminder every focus time event should carry, 0 meaning none.
    pub fn desired_reminder_minutes(&self) -> u32 {
        if self.set_event_reminder {
            self.event_reminder_time_minutes
        } else {
            0
        }
    }
}
