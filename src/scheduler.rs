//! Periodic background trigger of `focustime sync`.

use crate::config::environment_suffix;
use crate::errors::{AppError, AppResult};
use crate::execution::shell::run_capture;
use std::fs;
use std::path::{Path, PathBuf};

pub const SYNC_INTERVAL_SECS: u32 = 60;
const LAUNCHD_LABEL: &str = "FocusTimeApp";
const WINDOWS_TASK_NAME: &str = "Focus Time App Synchronization Trigger";
const SYSTEMD_UNIT: &str = "focustime-sync";

pub trait BackgroundScheduler {
    /// Remove any previous installation, then install afresh.
    fn install_or_repair(&self) -> AppResult<()>;

    /// Removing an absent installation is not an error.
    fn uninstall(&self) -> AppResult<()>;

    fn describe(&self) -> String;
}

/// The command line the scheduler runs every interval.
#[derive(Debug, Clone)]
pub struct SyncInvocation {
    pub executable: PathBuf,
    pub home: Option<PathBuf>,
}

impl SyncInvocation {
    pub fn current(home: Option<&Path>) -> AppResult<Self> {
        Ok(Self {
            executable: std::env::current_exe()?,
            home: home.map(Path::to_path_buf),
        })
    }

    pub fn arguments(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(home) = &self.home {
            args.push("--home".to_string());
            args.push(home.to_string_lossy().to_string());
        }
        args.push("sync".to_string());
        args
    }
}

pub fn platform_scheduler(invocation: SyncInvocation) -> AppResult<Box<dyn BackgroundScheduler>> {
    match std::env::consts::OS {
        "macos" => Ok(Box::new(LaunchdScheduler::new(invocation)?)),
        "windows" => Ok(Box::new(TaskScheduler { invocation })),
        "linux" => Ok(Box::new(SystemdTimerScheduler::new(invocation)?)),
        other => Err(AppError::UnsupportedPlatform(other.to_string())),
    }
}

fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::Other("cannot determine the home directory".into()))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ------------------------------------------------------------
// macOS launchd agent
// ------------------------------------------------------------

pub struct LaunchdScheduler {
    invocation: SyncInvocation,
    plist: PathBuf,
}

impl LaunchdScheduler {
    pub fn new(invocation: SyncInvocation) -> AppResult<Self> {
        let plist = home_dir()?
            .join("Library/LaunchAgents")
            .join(format!("focus-time-app{}.plist", environment_suffix()));
        Ok(Self { invocation, plist })
    }

    pub fn render_plist(&self) -> String {
        let mut program = vec![self.invocation.executable.to_string_lossy().to_string()];
        program.extend(self.invocation.arguments());
        let args: String = program
            .iter()
            .map(|a| format!("        <string>{}</string>\n", xml_escape(a)))
            .collect();

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
             <plist version=\"1.0\">\n\
             <dict>\n\
             \x20   <key>Label</key>\n\
             \x20   <string>{LAUNCHD_LABEL}{}</string>\n\
             \x20   <key>KeepAlive</key>\n\
             \x20   <true/>\n\
             \x20   <key>ThrottleInterval</key>\n\
             \x20   <integer>{SYNC_INTERVAL_SECS}</integer>\n\
             \x20   <key>ProgramArguments</key>\n\
             \x20   <array>\n{args}\
             \x20   </array>\n\
             </dict>\n\
             </plist>\n",
            environment_suffix()
        )
    }
}

impl BackgroundScheduler for LaunchdScheduler {
    fn install_or_repair(&self) -> AppResult<()> {
        self.uninstall()?;
        if let Some(parent) = self.plist.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.plist, self.render_plist())?;
        let plist = self.plist.to_string_lossy().to_string();
        run_capture("/bin/launchctl", &["load", &plist]).map(|_| ())
    }

    fn uninstall(&self) -> AppResult<()> {
        if !self.plist.exists() {
            return Ok(());
        }
        let plist = self.plist.to_string_lossy().to_string();
        // an agent that is not loaded makes unload fail, the file still goes
        let _ = run_capture("/bin/launchctl", &["unload", &plist]);
        fs::remove_file(&self.plist)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("launchd agent {}", self.plist.display())
    }
}

// ------------------------------------------------------------
// Windows Task Scheduler
// ------------------------------------------------------------

pub struct TaskScheduler {
    invocation: SyncInvocation,
}

impl TaskScheduler {
    fn task_name() -> String {
        format!("{WINDOWS_TASK_NAME}{}", environment_suffix())
    }

    fn task_command(&self) -> String {
        let mut parts = vec![format!("\"{}\"", self.invocation.executable.display())];
        parts.extend(
            self.invocation
                .arguments()
                .into_iter()
                .map(|a| if a.contains(' ') { format!("\"{a}\"") } else { a }),
        );
        parts.join(" ")
    }
}

impl BackgroundScheduler for TaskScheduler {
    fn install_or_repair(&self) -> AppResult<()> {
        self.uninstall()?;
        let name = Self::task_name();
        let command = self.task_command();
        run_capture(
            "schtasks",
            &["/Create", "/F", "/SC", "MINUTE", "/MO", "1", "/TN", &name, "/TR", &command],
        )
        .map(|_| ())
    }

    fn uninstall(&self) -> AppResult<()> {
        let name = Self::task_name();
        if run_capture("schtasks", &["/Query", "/TN", &name]).is_err() {
            return Ok(());
        }
        run_capture("schtasks", &["/Delete", "/F", "/TN", &name]).map(|_| ())
    }

    fn describe(&self) -> String {
        format!("scheduled task '{}'", Self::task_name())
    }
}

// ------------------------------------------------------------
// Linux systemd user timer
// ------------------------------------------------------------

pub struct SystemdTimerScheduler {
    invocation: SyncInvocation,
    unit_dir: PathBuf,
}

impl SystemdTimerScheduler {
    pub fn new(invocation: SyncInvocation) -> AppResult<Self> {
        let unit_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Other("cannot determine the config directory".into()))?
            .join("systemd/user");
        Ok(Self { invocation, unit_dir })
    }

    fn unit_name() -> String {
        format!("{SYSTEMD_UNIT}{}", environment_suffix())
    }

    fn service_file(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", Self::unit_name()))
    }

    fn timer_file(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.timer", Self::unit_name()))
    }

    pub fn render_service(&self) -> String {
        let mut exec = vec![format!("\"{}\"", self.invocation.executable.display())];
        exec.extend(
            self.invocation
                .arguments()
                .into_iter()
                .map(|a| format!("\"{a}\"")),
        );
        format!(
            "[Unit]\nDescription=Focus Time App synchronization\n\n\
             [Service]\nType=oneshot\nExecStart={}\n",
            exec.join(" ")
        )
    }

    pub fn render_timer(&self) -> String {
        format!(
            "[Unit]\nDescription=Run the Focus Time App synchronization every minute\n\n\
             [Timer]\nOnBootSec={SYNC_INTERVAL_SECS}s\nOnUnitActiveSec={SYNC_INTERVAL_SECS}s\nAccuracySec=1s\n\n\
             [Install]\nWantedBy=timers.target\n"
        )
    }
}

impl BackgroundScheduler for SystemdTimerScheduler {
    fn install_or_repair(&self) -> AppResult<()> {
        self.uninstall()?;
        fs::create_dir_all(&self.unit_dir)?;
        fs::write(self.service_file(), self.render_service())?;
        fs::write(self.timer_file(), self.render_timer())?;

        let timer = format!("{}.timer", Self::unit_name());
        run_capture("systemctl", &["--user", "daemon-reload"])?;
        run_capture("systemctl", &["--user", "enable", "--now", &timer]).map(|_| ())
    }

    fn uninstall(&self) -> AppResult<()> {
        let timer_file = self.timer_file();
        if !timer_file.exists() && !self.service_file().exists() {
            return Ok(());
        }
        let timer = format!("{}.timer", Self::unit_name());
        let _ = run_capture("systemctl", &["--user", "disable", "--now", &timer]);
        for file in [timer_file, self.service_file()] {
            if file.exists() {
                fs::remove_file(file)?;
            }
        }
        let _ = run_capture("systemctl", &["--user", "daemon-reload"]);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("systemd user timer {}", self.timer_file().display())
    }
}
