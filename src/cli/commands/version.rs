use crate::cli::parser::Commands;
use crate::errors::AppResult;

pub fn handle(cmd: &Commands) -> AppResult<()> {
    if matches!(cmd, Commands::Version) {
        println!("focustime {}", env!("CARGO_PKG_VERSION"));
    }
    Ok(())
}
