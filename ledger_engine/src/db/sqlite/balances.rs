use ledger_common::Points;
use log::debug;
use sqlx::SqliteConnection;

use crate::{db::sqlite::SqliteDatabaseError, db_types::Balance};

/// Adds `amount` to the user's current balance, creating the balance row if needed. Returns the new current balance.
pub async fn credit(user_id: i64, amount: Points, conn: &mut SqliteConnection) -> Result<Points, SqliteDatabaseError> {
    let current = sqlx::query_scalar::<_, Points>(
        r#"
            INSERT INTO balances (user_id, current) VALUES ($1, $2)
            ON CONFLICT(user_id) DO UPDATE SET
                current = current + excluded.current,
                updated_at = CURRENT_TIMESTAMP
            RETURNING current
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Credited {amount} points to user #{user_id}. Current balance: {current}");
    Ok(current)
}

pub async fn fetch_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Balance, SqliteDatabaseError> {
    let balance = sqlx::query_as::<_, Balance>("SELECT user_id, current, withdrawn FROM balances WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance.unwrap_or_else(|| Balance::empty(user_id)))
}
