use crate::Context;
use crate::cli::parser::Commands;
use crate::core::session::SessionLogic;
use crate::errors::AppResult;
use crate::ui::messages::success;
use crate::utils::time::local_hhmm;
use chrono::Utc;

/// Handle the `start` command
pub fn handle(cmd: &Commands, ctx: &Context) -> AppResult<()> {
    if let Commands::Start { duration } = cmd {
        let event = super::with_engine(ctx, |engine, config| {
            let (event, _report) = SessionLogic::start(engine, config, *duration, Utc::now())?;
            Ok(event)
        })?;

        ctx.log.record(
            "start",
            &event.id,
            &format!("{} minute(s) until {}", duration, event.end.to_rfc3339()),
        );
        success(format!(
            "Focus time event created, it ends at {}",
            local_hhmm(event.end)
        ));
    }
    Ok(())
}
