//! Windows: Focus Assist is driven by the `windows-dnd.exe` helper shipped
//! next to the main executable.

use super::shell::run_capture;
use super::{CommandExecutor, WINDOWS_ALARMS_ONLY_PROFILE, WINDOWS_PRIORITY_ONLY_PROFILE};
use crate::errors::{AppError, AppResult};
use std::path::PathBuf;

const HELPER_BINARY: &str = "windows-dnd.exe";

pub struct WindowsCommandExecutor {
    helper: Option<PathBuf>,
}

impl WindowsCommandExecutor {
    pub fn new() -> Self {
        let helper = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(HELPER_BINARY)));
        Self { helper }
    }

    fn helper(&self) -> AppResult<String> {
        match &self.helper {
            Some(path) if path.is_file() => Ok(path.to_string_lossy().to_string()),
            _ => Err(AppError::Other(format!(
                "{HELPER_BINARY} was not found next to the focustime executable"
            ))),
        }
    }
}

impl Default for WindowsCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn set_argument(profile: &str) -> AppResult<&'static str> {
    match profile {
        WINDOWS_PRIORITY_ONLY_PROFILE => Ok("set-priority-only"),
        WINDOWS_ALARMS_ONLY_PROFILE => Ok("set-alarms-only"),
        other => Err(AppError::Config(format!(
            "Unknown Focus Assist profile '{other}', use '{WINDOWS_PRIORITY_ONLY_PROFILE}' or '{WINDOWS_ALARMS_ONLY_PROFILE}'"
        ))),
    }
}

impl CommandExecutor for WindowsCommandExecutor {
    fn name(&self) -> &'static str {
        "Windows Focus Assist"
    }

    fn is_dnd_active(&self) -> AppResult<bool> {
        let profile = run_capture(&self.helper()?, &["get-profile"])?;
        Ok(profile != "off")
    }

    fn set_dnd_active(&self, active: bool, dnd_profile_name: &str) -> AppResult<()> {
        let arg = if active {
            set_argument(dnd_profile_name)?
        } else {
            "set-off"
        };
        run_capture(&self.helper()?, &[arg]).map(|_| ())
    }

    fn is_dnd_helper_installed(&self) -> AppResult<bool> {
        Ok(self.helper().is_ok())
    }

    fn install_dnd_helpers(&self) -> AppResult<()> {
        self.helper().map(|_| ())
    }

    fn uninstall_dnd_helpers(&self) -> AppResult<()> {
        Ok(())
    }
}
