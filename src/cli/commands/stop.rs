use crate::Context;
use crate::cli::parser::Commands;
use crate::core::session::SessionLogic;
use crate::errors::AppResult;
use crate::ui::messages::success;
use chrono::Utc;

/// Handle the `stop` command
pub fn handle(cmd: &Commands, ctx: &Context) -> AppResult<()> {
    if matches!(cmd, Commands::Stop) {
        let event = super::with_engine(ctx, |engine, config| {
            let (event, _report) = SessionLogic::stop(engine, config, Utc::now())?;
            Ok(event)
        })?;

        ctx.log
            .record("stop", &event.id, &format!("ended at {}", event.end.to_rfc3339()));
        success("Focus time event shortened to end now");
    }
    Ok(())
}
