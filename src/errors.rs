//! Unified application error type.
//! All modules (calendar, execution, state, core, cli) return AppError to keep
//! the error handling consistent and easy to manage.

use std::io;
use thiserror::Error;

pub const NO_CONFIG_FILE_ERROR_MSG: &str = "For this command to work, you first need to run the 'configure' command to set the necessary configuration!";

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Activity log database
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    // ---------------------------
    // Serialization
    // ---------------------------
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("{NO_CONFIG_FILE_ERROR_MSG}")]
    ConfigMissing,

    #[error("Configuration error: {0}")]
    Config(String),

    // ---------------------------
    // Calendar errors
    // ---------------------------
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Calendar event not found: {0}")]
    EventNotFound(String),

    #[error("Credential store error: {0}")]
    Credential(String),

    // ---------------------------
    // Command execution
    // ---------------------------
    #[error("Command '{command}' failed: {status}")]
    CommandFailed { command: String, status: String },

    // ---------------------------
    // Session logic
    // ---------------------------
    #[error("Cannot create a new focus time event because there is already one active")]
    SessionAlreadyActive,

    #[error("There is no ongoing focus time event, therefore the focus time cannot be stopped")]
    NoActiveSession,

    #[error("Another instance of the Focus time app is already running")]
    AlreadyRunning,

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

pub type AppResult<T> = Result<T, AppError>;
