//! macOS: Focus modes are toggled through a user Shortcut named after the
//! configured profile, which receives "on" or "off" as input.

use super::CommandExecutor;
use super::shell::{run_capture, run_with_input};
use crate::errors::AppResult;
use crate::ui::messages::warning;
use std::path::PathBuf;

pub struct MacOsCommandExecutor;

const DEFAULT_SHORTCUT_NAME: &str = "focus-time-app";

fn assertions_file() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join("Library/DoNotDisturb/DB/Assertions.json"))
}

impl CommandExecutor for MacOsCommandExecutor {
    fn name(&self) -> &'static str {
        "macOS Shortcuts"
    }

    fn is_dnd_active(&self) -> AppResult<bool> {
        let Some(path) = assertions_file() else {
            return Ok(false);
        };
        if !path.is_file() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let active = value["data"]
            .as_array()
            .and_then(|data| data.first())
            .and_then(|entry| entry["storeAssertionRecords"].as_array())
            .is_some_and(|records| !records.is_empty());
        Ok(active)
    }

    fn set_dnd_active(&self, active: bool, dnd_profile_name: &str) -> AppResult<()> {
        let input = if active { "on" } else { "off" };
        run_with_input(
            "shortcuts",
            &["run", dnd_profile_name, "--input-path", "-"],
            input,
        )
    }

    fn is_dnd_helper_installed(&self) -> AppResult<bool> {
        let listing = run_capture("shortcuts", &["list"])?;
        Ok(listing.lines().any(|l| l.trim() == DEFAULT_SHORTCUT_NAME))
    }

    fn install_dnd_helpers(&self) -> AppResult<()> {
        if self.is_dnd_helper_installed()? {
            return Ok(());
        }
        warning(format!(
            "Shortcut '{DEFAULT_SHORTCUT_NAME}' not found. Create it in the Shortcuts app: \
             it must receive 'on' or 'off' as input and set the Focus mode accordingly."
        ));
        run_capture("open", &["-a", "Shortcuts"])?;
        Ok(())
    }

    fn uninstall_dnd_helpers(&self) -> AppResult<()> {
        // the shortcuts CLI cannot delete shortcuts
        Ok(())
    }
}
