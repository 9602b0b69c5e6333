use crate::Context;
use crate::cli::parser::Commands;
use crate::core::configure::ConfigureLogic;
use crate::errors::AppResult;

/// Handle the `doctor` command
pub fn handle(cmd: &Commands, ctx: &Context) -> AppResult<()> {
    if matches!(cmd, Commands::Doctor) {
        super::with_integrations(ctx, false, |integrations| {
            ConfigureLogic::doctor(integrations, &ctx.log)
        })?;
    }
    Ok(())
}
