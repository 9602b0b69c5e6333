use crate::Context;
use crate::cli::parser::Commands;
use crate::core::configure::ConfigureLogic;
use crate::errors::AppResult;

/// Handle the `uninstall` command
pub fn handle(cmd: &Commands, ctx: &Context) -> AppResult<()> {
    if matches!(cmd, Commands::Uninstall) {
        super::with_integrations(ctx, false, |integrations| {
            ConfigureLogic::uninstall(integrations, &ctx.log)
        })?;
    }
    Ok(())
}
