use crate::calendar::{CalendarType, create_calendar_adapter, prompt_line};
use crate::config::migrate::{check_config_file, migrate_config_file};
use crate::config::{Config, StoragePaths};
use crate::db::log::ActivityLog;
use crate::errors::{AppError, AppResult};
use crate::execution::CommandExecutor;
use crate::scheduler::BackgroundScheduler;
use crate::ui::messages::{info, success, warning};
use std::fs;
use std::io::BufRead;
use std::process::Command;

const AUTHENTICATION_ATTEMPTS: usize = 3;

/// OS integrations touched by configure / doctor / uninstall. Both are absent
/// in test mode.
pub struct Integrations<'a> {
    pub executor: Option<&'a dyn CommandExecutor>,
    pub scheduler: Option<&'a dyn BackgroundScheduler>,
}

impl Integrations<'_> {
    pub fn none() -> Self {
        Self {
            executor: None,
            scheduler: None,
        }
    }
}

pub struct ConfigureLogic;

impl ConfigureLogic {
    pub fn print(paths: &StoragePaths) -> AppResult<()> {
        let path = paths.config_file();
        if !path.exists() {
            return Err(AppError::ConfigMissing);
        }
        println!("📄 Current configuration ({}):\n", path.display());
        println!("{}", fs::read_to_string(path)?);
        Ok(())
    }

    /// Open the configuration file in `editor`, `$EDITOR`/`$VISUAL` or the
    /// platform default, falling back to the default when the requested
    /// editor fails.
    pub fn edit(paths: &StoragePaths, editor: &Option<String>) -> AppResult<()> {
        let path = paths.config_file();
        if !path.exists() {
            return Err(AppError::ConfigMissing);
        }

        let default_editor = std::env::var("EDITOR")
            .or_else(|_| std::env::var("VISUAL"))
            .unwrap_or_else(|_| {
                if cfg!(target_os = "windows") {
                    "notepad".to_string()
                } else {
                    "nano".to_string()
                }
            });
        let editor_to_use = editor.clone().unwrap_or_else(|| default_editor.clone());

        match Command::new(&editor_to_use).arg(&path).status() {
            Ok(s) if s.success() => {
                success(format!(
                    "Configuration file edited successfully using '{editor_to_use}'"
                ));
                Ok(())
            }
            _ => {
                warning(format!(
                    "Editor '{editor_to_use}' not available, falling back to '{default_editor}'"
                ));
                match Command::new(&default_editor).arg(&path).status() {
                    Ok(s) if s.success() => {
                        success(format!(
                            "Configuration file edited successfully using fallback '{default_editor}'"
                        ));
                        Ok(())
                    }
                    _ => Err(AppError::Config(format!(
                        "Failed to edit configuration file using fallback '{default_editor}'"
                    ))),
                }
            }
        }
    }

    /// Report missing keys and whether the file passes validation.
    pub fn check(paths: &StoragePaths) -> AppResult<bool> {
        let report = check_config_file(paths)?;
        for key in &report.missing_required {
            warning(format!("Missing required key: {key}"));
        }
        for key in &report.missing_optional {
            info(format!("Missing optional key (default applies): {key}"));
        }

        match Config::load(paths) {
            Ok(_) if report.missing_required.is_empty() => {
                success("Configuration file is valid.");
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) => {
                warning(e.to_string());
                Ok(false)
            }
        }
    }

    pub fn migrate(paths: &StoragePaths, log: &ActivityLog) -> AppResult<()> {
        if migrate_config_file(paths)? {
            log.record("config_migrate", "", "Added missing optional keys");
            success(format!(
                "Configuration file migrated: {}",
                paths.config_file().display()
            ));
        } else {
            info("Configuration file is already up to date.");
        }
        Ok(())
    }

    /// Create or re-check the configuration, then set up the OS integrations.
    ///
    /// An existing configuration is kept unless `calendar_type` asks for a
    /// different provider.
    pub fn configure(
        paths: &StoragePaths,
        calendar_type: Option<CalendarType>,
        input: &mut dyn BufRead,
        integrations: &Integrations<'_>,
        log: &ActivityLog,
    ) -> AppResult<Config> {
        let existing = match Config::load(paths) {
            Ok(cfg) => Some(cfg),
            Err(AppError::ConfigMissing) => None,
            Err(e) => {
                warning(format!("Ignoring the invalid existing configuration: {e}"));
                None
            }
        };

        let config = match existing {
            Some(cfg) if calendar_type.is_none_or(|t| t == cfg.calendar_type) => {
                info(format!(
                    "There is already an active configuration stored at {}",
                    paths.config_file().display()
                ));
                let mut adapter = create_calendar_adapter(&cfg, paths)?;
                match adapter.check_connection_and_credentials() {
                    Ok(()) => success(
                        "Successfully established a test connection to your configured calendar",
                    ),
                    Err(e) => warning(format!(
                        "Unable to establish a working connection to your configured calendar: {e}"
                    )),
                }
                cfg
            }
            _ => {
                let calendar_type = match calendar_type {
                    Some(t) => t,
                    None => prompt_calendar_type(input)?,
                };
                let config = Self::create(paths, calendar_type, input)?;
                log.record(
                    "configure",
                    &calendar_type.to_string(),
                    "New configuration stored",
                );
                config
            }
        };

        Self::install_integrations(integrations);

        success(format!(
            "Configuration completed. You can manually change the configuration by editing the file at '{}'",
            paths.config_file().display()
        ));
        Ok(config)
    }

    fn create(
        paths: &StoragePaths,
        calendar_type: CalendarType,
        input: &mut dyn BufRead,
    ) -> AppResult<Config> {
        let mut config = Config::new_default(calendar_type, paths);
        let mut adapter = create_calendar_adapter(&config, paths)?;

        let mut adapter_configuration = None;
        for _ in 0..AUTHENTICATION_ATTEMPTS {
            if let Some(ac) = adapter.authenticate(input)? {
                adapter_configuration = Some(ac);
                break;
            }
            warning("Calendar provider configuration failed, trying again");
        }
        let Some(adapter_configuration) = adapter_configuration else {
            return Err(AppError::Config(
                "Aborting the configuration process".to_string(),
            ));
        };

        config.adapter_configuration = Some(adapter_configuration);
        config.validate()?;

        let mut adapter = create_calendar_adapter(&config, paths)?;
        adapter.check_connection_and_credentials()?;

        config.store(paths)?;
        Ok(config)
    }

    fn install_integrations(integrations: &Integrations<'_>) {
        if let Some(executor) = integrations.executor {
            match executor.install_dnd_helpers() {
                Ok(()) => success(format!("DND helpers ready ({})", executor.name())),
                Err(e) => warning(format!("Could not install the DND helpers: {e}")),
            }
        }
        if let Some(scheduler) = integrations.scheduler {
            match scheduler.install_or_repair() {
                Ok(()) => success(format!("Background scheduler installed: {}", scheduler.describe())),
                Err(e) => warning(format!("Could not install the background scheduler: {e}")),
            }
        }
    }

    /// Reinstall the background scheduler and the DND helpers.
    pub fn doctor(integrations: &Integrations<'_>, log: &ActivityLog) -> AppResult<()> {
        match integrations.scheduler {
            Some(scheduler) => {
                scheduler.install_or_repair()?;
                success("Background scheduler has been reinstalled");
                log.record("doctor", "scheduler", &scheduler.describe());
            }
            None => info("Background scheduler: skipped"),
        }

        match integrations.executor {
            Some(executor) => {
                executor.uninstall_dnd_helpers()?;
                executor.install_dnd_helpers()?;
                success(format!("DND helpers have been reinstalled ({})", executor.name()));
                log.record("doctor", "dnd_helpers", executor.name());
                match executor.is_dnd_active() {
                    Ok(true) => info("Do-Not-Disturb is currently on"),
                    Ok(false) => info("Do-Not-Disturb is currently off"),
                    Err(e) => warning(format!("Could not read the Do-Not-Disturb state: {e}")),
                }
            }
            None => info("DND helpers: skipped"),
        }
        Ok(())
    }

    /// Remove the DND helpers and the background scheduler, if the OS allows it.
    pub fn uninstall(integrations: &Integrations<'_>, log: &ActivityLog) -> AppResult<()> {
        if let Some(executor) = integrations.executor {
            executor.uninstall_dnd_helpers()?;
            success("DND helpers removed");
        }
        if let Some(scheduler) = integrations.scheduler {
            scheduler.uninstall()?;
            success(format!("Removed {}", scheduler.describe()));
        }
        log.record("uninstall", "", "OS integrations removed");
        Ok(())
    }
}

fn prompt_calendar_type(input: &mut dyn BufRead) -> AppResult<CalendarType> {
    let answer = prompt_line(
        input,
        "Choose your calendar provider (outlook365, caldav, local-file) [local-file]:",
    )?;
    if answer.is_empty() {
        return Ok(CalendarType::LocalFile);
    }
    <CalendarType as clap::ValueEnum>::from_str(&answer, true).map_err(AppError::Config)
}
