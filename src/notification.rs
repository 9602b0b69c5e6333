//! OS-native desktop notifications.
//!
//! Delivery is best effort: callers ignore failures.

use crate::errors::AppResult;
use crate::execution::shell::run_capture;

pub const NOTIFICATION_TITLE: &str = "Focus Time App";

pub trait OsNotification {
    fn send_notification(&self, title: &str, message: &str) -> AppResult<()>;
}

pub struct MacOsNotification;

impl OsNotification for MacOsNotification {
    fn send_notification(&self, title: &str, message: &str) -> AppResult<()> {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            applescript_escape(message),
            applescript_escape(title)
        );
        run_capture("osascript", &["-e", &script]).map(|_| ())
    }
}

pub struct WindowsNotification;

impl OsNotification for WindowsNotification {
    fn send_notification(&self, title: &str, message: &str) -> AppResult<()> {
        let script = format!(
            "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] > $null; \
             $xml = [Windows.UI.Notifications.ToastNotificationManager]::GetTemplateContent([Windows.UI.Notifications.ToastTemplateType]::ToastText02); \
             $text = $xml.GetElementsByTagName('text'); \
             $text.Item(0).AppendChild($xml.CreateTextNode('{}')) > $null; \
             $text.Item(1).AppendChild($xml.CreateTextNode('{}')) > $null; \
             $toast = [Windows.UI.Notifications.ToastNotification]::new($xml); \
             [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{}').Show($toast)",
            powershell_escape(title),
            powershell_escape(message),
            NOTIFICATION_TITLE
        );
        run_capture("powershell", &["-NoProfile", "-Command", &script]).map(|_| ())
    }
}

pub struct LinuxNotification;

impl OsNotification for LinuxNotification {
    fn send_notification(&self, title: &str, message: &str) -> AppResult<()> {
        run_capture("notify-send", &["--app-name", NOTIFICATION_TITLE, title, message]).map(|_| ())
    }
}

/// Drops every notification. Used when notifications are disabled and in
/// test mode.
pub struct SilentNotification;

impl OsNotification for SilentNotification {
    fn send_notification(&self, _title: &str, _message: &str) -> AppResult<()> {
        Ok(())
    }
}

pub fn platform_notifier(enabled: bool) -> Box<dyn OsNotification> {
    if !enabled {
        return Box::new(SilentNotification);
    }
    match std::env::consts::OS {
        "macos" => Box::new(MacOsNotification),
        "windows" => Box::new(WindowsNotification),
        "linux" => Box::new(LinuxNotification),
        _ => Box::new(SilentNotification),
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn powershell_escape(s: &str) -> String {
    s.replace('\'', "''")
}
