use crate::config::StoragePaths;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::ui::messages::warning;
use chrono::Local;
use rusqlite::Connection;
use rusqlite::params;

/// Write an internal log line into the `log` table.
pub fn ttlog(conn: &Connection, operation: &str, target: &str, message: &str) -> AppResult<()> {
    let now = Local::now().to_rfc3339();

    let mut stmt = conn.prepare_cached(
        "INSERT INTO log (date, operation, target, message)
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    stmt.execute(params![now, operation, target, message])?;

    Ok(())
}

/// Activity log of one invocation. Failing to open or write it only prints a
/// warning; the focus time logic never depends on it.
pub struct ActivityLog {
    pool: Option<DbPool>,
}

impl ActivityLog {
    pub fn open(paths: &StoragePaths) -> Self {
        match DbPool::open(&paths.database_file()) {
            Ok(pool) => Self { pool: Some(pool) },
            Err(e) => {
                warning(format!("Activity log unavailable: {e}"));
                Self { pool: None }
            }
        }
    }

    pub fn disabled() -> Self {
        Self { pool: None }
    }

    pub fn record(&self, operation: &str, target: &str, message: &str) {
        let Some(pool) = &self.pool else {
            return;
        };
        if let Err(e) = ttlog(&pool.conn, operation, target, message) {
            warning(format!("Failed to write activity log: {e}"));
        }
    }
}
