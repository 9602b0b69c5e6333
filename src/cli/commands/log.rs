use crate::cli::parser::Commands;
use crate::config::StoragePaths;
use crate::core::log::LogLogic;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::ui::messages::info;

pub fn handle(cmd: &Commands, paths: &StoragePaths) -> AppResult<()> {
    match cmd {
        Commands::Log { print: true } => {
            let pool = DbPool::open(&paths.database_file())?;
            LogLogic::print_log(&pool)?;
        }
        Commands::Log { print: false } => info("Use 'focustime log --print' to show the internal log."),
        _ => {}
    }
    Ok(())
}
