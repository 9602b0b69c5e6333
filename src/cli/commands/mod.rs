pub mod configure;
pub mod doctor;
pub mod log;
pub mod start;
pub mod stop;
pub mod sync;
pub mod uninstall;
pub mod version;

use crate::Context;
use crate::calendar::create_calendar_adapter;
use crate::config::Config;
use crate::core::configure::Integrations;
use crate::core::sync::SyncEngine;
use crate::errors::{AppError, AppResult};
use crate::execution::{CommandExecutor, platform_executor};
use crate::notification::platform_notifier;
use crate::scheduler::{BackgroundScheduler, SyncInvocation, platform_scheduler};
use crate::state::FileMarker;

/// Load the configuration, verify the calendar connection and hand a ready
/// sync engine to `f`.
pub(crate) fn with_engine<T>(
    ctx: &Context,
    f: impl FnOnce(&mut SyncEngine<'_>, &Config) -> AppResult<T>,
) -> AppResult<T> {
    let config = Config::load(&ctx.paths)?;

    let mut calendar = create_calendar_adapter(&config, &ctx.paths)?;
    calendar.check_connection_and_credentials().map_err(|e| {
        AppError::Calendar(format!(
            "Could not establish a valid connection to your calendar (are the credentials valid?): {e}"
        ))
    })?;

    let executor = platform_executor()?;
    let notifier = platform_notifier(config.show_notification && !ctx.test);
    let mut marker = FileMarker::new(ctx.paths.marker_file());

    let mut engine = SyncEngine::new(
        &config,
        calendar.as_mut(),
        executor.as_ref(),
        notifier.as_ref(),
        &mut marker,
        &ctx.log,
    );
    f(&mut engine, &config)
}

/// Platform executor and scheduler, or none of them in test mode.
pub(crate) fn with_integrations<T>(
    ctx: &Context,
    skip_scheduler: bool,
    f: impl FnOnce(&Integrations<'_>) -> AppResult<T>,
) -> AppResult<T> {
    if ctx.test {
        return f(&Integrations::none());
    }

    let executor: Box<dyn CommandExecutor> = platform_executor()?;
    let scheduler: Option<Box<dyn BackgroundScheduler>> = if skip_scheduler {
        None
    } else {
        let invocation = SyncInvocation::current(ctx.home.as_deref())?;
        Some(platform_scheduler(invocation)?)
    };

    f(&Integrations {
        executor: Some(executor.as_ref()),
        scheduler: scheduler.as_deref(),
    })
}
