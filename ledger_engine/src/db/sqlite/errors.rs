use thiserror::Error;

use crate::db_types::OrderNumber;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Order {0} does not exist for this user")]
    OrderNotFound(OrderNumber),
}
