//! Linux (GNOME): DND means notification banners are hidden.

use super::CommandExecutor;
use super::shell::{is_available, run_capture};
use crate::errors::{AppError, AppResult};

const SCHEMA: &str = "org.gnome.desktop.notifications";
const KEY: &str = "show-banners";

pub struct LinuxCommandExecutor;

impl CommandExecutor for LinuxCommandExecutor {
    fn name(&self) -> &'static str {
        "GNOME notifications"
    }

    fn is_dnd_active(&self) -> AppResult<bool> {
        let value = run_capture("gsettings", &["get", SCHEMA, KEY])?;
        Ok(value == "false")
    }

    // the profile has no meaning on GNOME
    fn set_dnd_active(&self, active: bool, _dnd_profile_name: &str) -> AppResult<()> {
        let show_banners = if active { "false" } else { "true" };
        run_capture("gsettings", &["set", SCHEMA, KEY, show_banners]).map(|_| ())
    }

    fn is_dnd_helper_installed(&self) -> AppResult<bool> {
        Ok(is_available("gsettings", "--version"))
    }

    fn install_dnd_helpers(&self) -> AppResult<()> {
        if self.is_dnd_helper_installed()? {
            Ok(())
        } else {
            Err(AppError::Other(
                "gsettings is not available, the dnd-start/dnd-stop commands will not work".into(),
            ))
        }
    }

    fn uninstall_dnd_helpers(&self) -> AppResult<()> {
        Ok(())
    }
}
