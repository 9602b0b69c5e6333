//! focustime library root.
//! Exposes the CLI parser, the high-level run() function, and internal modules.

pub mod calendar;
pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod execution;
pub mod notification;
pub mod scheduler;
pub mod state;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::StoragePaths;
use db::log::ActivityLog;
use errors::AppResult;
use state::InstanceLock;
use std::path::PathBuf;

/// Everything a command handler needs besides its own arguments.
pub struct Context {
    pub paths: StoragePaths,
    /// `--home` as given, forwarded to the background scheduler.
    pub home: Option<PathBuf>,
    pub test: bool,
    pub log: ActivityLog,
}

/// Central command dispatcher
pub fn dispatch(cli: &Cli, ctx: &Context) -> AppResult<()> {
    match &cli.command {
        Commands::Sync => cli::commands::sync::handle(&cli.command, ctx),
        Commands::Start { .. } => cli::commands::start::handle(&cli.command, ctx),
        Commands::Stop => cli::commands::stop::handle(&cli.command, ctx),
        Commands::Configure { .. } => cli::commands::configure::handle(&cli.command, ctx),
        Commands::Doctor => cli::commands::doctor::handle(&cli.command, ctx),
        Commands::Uninstall => cli::commands::uninstall::handle(&cli.command, ctx),
        Commands::Version => cli::commands::version::handle(&cli.command),
        Commands::Log { .. } => cli::commands::log::handle(&cli.command, &ctx.paths),
    }
}

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let paths = StoragePaths::resolve(cli.home.as_deref());

    // read-only commands neither lock nor log
    if cli.command.is_read_only() {
        let ctx = Context {
            paths,
            home: cli.home.clone(),
            test: cli.test,
            log: ActivityLog::disabled(),
        };
        return dispatch(&cli, &ctx);
    }

    execution::check_platform()?;
    paths.ensure_dir()?;

    // held until the end of the invocation
    let _lock = InstanceLock::acquire(&paths.lock_file())?;

    let ctx = Context {
        log: ActivityLog::open(&paths),
        paths,
        home: cli.home.clone(),
        test: cli.test,
    };

    let result = dispatch(&cli, &ctx);
    if let Err(e) = &result {
        ctx.log.record("error", cli.command.name(), &e.to_string());
    }
    result
}
