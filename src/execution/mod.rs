//! Side effects of a focus time transition.
//!
//! Configured start/stop commands run through the shell, except the two
//! sentinel tokens which toggle the operating system's native Do-Not-Disturb
//! mode. One strategy per operating system is picked once at startup.

pub mod linux;
pub mod macos;
pub mod shell;
pub mod windows;

use crate::errors::{AppError, AppResult};

pub const DND_START_COMMAND: &str = "dnd-start";
pub const DND_STOP_COMMAND: &str = "dnd-stop";

pub const WINDOWS_PRIORITY_ONLY_PROFILE: &str = "prio-only";
pub const WINDOWS_ALARMS_ONLY_PROFILE: &str = "alarms-only";

pub trait CommandExecutor {
    fn name(&self) -> &'static str;

    /// Run `commands` in order and stop at the first failure; the remaining
    /// commands of the list are not attempted.
    fn execute_commands(&self, commands: &[String], dnd_profile_name: &str) -> AppResult<()> {
        for command in commands {
            match command.trim() {
                DND_START_COMMAND => self.set_dnd_active(true, dnd_profile_name)?,
                DND_STOP_COMMAND => self.set_dnd_active(false, dnd_profile_name)?,
                other => shell::run_shell(other)?,
            }
        }
        Ok(())
    }

    fn is_dnd_active(&self) -> AppResult<bool>;

    fn set_dnd_active(&self, active: bool, dnd_profile_name: &str) -> AppResult<()>;

    fn is_dnd_helper_installed(&self) -> AppResult<bool>;

    fn install_dnd_helpers(&self) -> AppResult<()>;

    fn uninstall_dnd_helpers(&self) -> AppResult<()>;
}

/// Executor for the platform this process runs on.
pub fn platform_executor() -> AppResult<Box<dyn CommandExecutor>> {
    executor_for(std::env::consts::OS)
}

pub fn executor_for(os: &str) -> AppResult<Box<dyn CommandExecutor>> {
    match os {
        "macos" => Ok(Box::new(macos::MacOsCommandExecutor)),
        "windows" => Ok(Box::new(windows::WindowsCommandExecutor::new())),
        "linux" => Ok(Box::new(linux::LinuxCommandExecutor)),
        other => Err(AppError::UnsupportedPlatform(other.to_string())),
    }
}

/// Fails early on platforms none of the strategies support.
pub fn check_platform() -> AppResult<()> {
    match std::env::consts::OS {
        "macos" | "windows" | "linux" => Ok(()),
        other => Err(AppError::UnsupportedPlatform(other.to_string())),
    }
}
