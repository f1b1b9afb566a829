use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Creates an empty, migrated database at `url` and returns a connection to it.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    let db = SqliteDatabase::new_with_url(url, 10).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    db
}

/// A database URL in the system temp directory that no other test is using.
pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("ledger_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Could not drop database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

/// Closes the connection and deletes the database file.
pub async fn destroy_database(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("Could not remove test database {url}: {e:?}");
    }
}
