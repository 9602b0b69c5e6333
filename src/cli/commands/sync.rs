use crate::Context;
use crate::cli::parser::Commands;
use crate::errors::AppResult;
use chrono::Utc;

/// Handle the `sync` command
pub fn handle(cmd: &Commands, ctx: &Context) -> AppResult<()> {
    if matches!(cmd, Commands::Sync) {
        super::with_engine(ctx, |engine, _config| {
            engine.run(Utc::now())?;
            Ok(())
        })?;
    }
    Ok(())
}
