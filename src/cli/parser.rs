use crate::calendar::CalendarType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface definition for focustime
/// Mirrors focus time calendar events onto Do-Not-Disturb and custom commands
#[derive(Parser)]
#[command(
    name = "focustime",
    version = env!("CARGO_PKG_VERSION"),
    about = "Triggers your desktop OS's Do-Not-Disturb feature (and other arbitrary scripts), based on blocker events on your calendar",
    long_about = None
)]
pub struct Cli {
    /// Override the storage directory (configuration, marker, activity log)
    #[arg(global = true, long = "home", env = "FOCUSTIME_HOME")]
    pub home: Option<PathBuf>,

    /// Run in test mode (no OS notifications, scheduler or DND helper setup)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the Do-Not-Disturb state of this machine with your focus time events
    Sync,

    /// Create a focus time event that starts now, then synchronize
    Start {
        /// Duration of the focus time in minutes
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        duration: u32,
    },

    /// End the ongoing focus time event now, then synchronize
    Stop,

    /// Check the existing configuration or create a new one
    Configure {
        #[arg(long = "print", help = "Print the current configuration file")]
        print_config: bool,

        #[arg(long = "check", help = "Check configuration file for missing fields")]
        check: bool,

        #[arg(long = "migrate", help = "Add missing optional fields to the configuration file")]
        migrate: bool,

        #[arg(
            long = "edit",
            help = "Edit the configuration file (default editor: $EDITOR, or nano/notepad)"
        )]
        edit_config: bool,

        #[arg(
            long = "editor",
            help = "Specify the editor to use (vim, nano, or custom path)"
        )]
        editor: Option<String>,

        #[arg(
            long = "calendar-type",
            value_enum,
            help = "Calendar provider of a new configuration"
        )]
        calendar_type: Option<CalendarType>,

        #[arg(
            long = "skip-background-scheduler-setup",
            help = "Do not register the OS background job that regularly runs 'sync'"
        )]
        skip_background_scheduler_setup: bool,
    },

    /// Reinstall the background scheduler and the Do-Not-Disturb helpers
    Doctor,

    /// Remove the background scheduler and the Do-Not-Disturb helpers
    Uninstall,

    /// Print the version
    Version,

    /// Print the internal activity log
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },
}

impl Commands {
    /// Commands that run without the single-instance guard.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Commands::Version | Commands::Log { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Commands::Sync => "sync",
            Commands::Start { .. } => "start",
            Commands::Stop => "stop",
            Commands::Configure { .. } => "configure",
            Commands::Doctor => "doctor",
            Commands::Uninstall => "uninstall",
            Commands::Version => "version",
            Commands::Log { .. } => "log",
        }
    }
}
