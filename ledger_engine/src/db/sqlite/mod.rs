mod balances;
mod db;
mod errors;
mod orders;

use std::{str::FromStr, time::Duration};

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a connection pool. The database file is created if it does not exist yet.
///
/// Many workers write concurrently, so the database runs in WAL mode and writers wait for the lock instead of failing
/// straight away.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
