use crate::Context;
use crate::cli::parser::Commands;
use crate::core::configure::ConfigureLogic;
use crate::errors::{AppError, AppResult};
use std::io;

/// Handle the `configure` command
pub fn handle(cmd: &Commands, ctx: &Context) -> AppResult<()> {
    if let Commands::Configure {
        print_config,
        check,
        migrate,
        edit_config,
        editor,
        calendar_type,
        skip_background_scheduler_setup,
    } = cmd
    {
        // ---- MAINTENANCE FLAGS ----
        if *print_config || *check || *migrate || *edit_config {
            if *migrate {
                ConfigureLogic::migrate(&ctx.paths, &ctx.log)?;
            }
            if *check && !ConfigureLogic::check(&ctx.paths)? {
                return Err(AppError::Config(
                    "The configuration file has problems, see above".into(),
                ));
            }
            if *edit_config {
                ConfigureLogic::edit(&ctx.paths, editor)?;
            }
            if *print_config {
                ConfigureLogic::print(&ctx.paths)?;
            }
            return Ok(());
        }

        // ---- (RE)CONFIGURATION ----
        let stdin = io::stdin();
        let mut input = stdin.lock();
        super::with_integrations(ctx, *skip_background_scheduler_setup, |integrations| {
            ConfigureLogic::configure(&ctx.paths, *calendar_type, &mut input, integrations, &ctx.log)
                .map(|_| ())
        })?;
    }
    Ok(())
}
