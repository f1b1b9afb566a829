use ledger_common::Points;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertOrderResult},
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType},
};

const ORDER_COLUMNS: &str = "number, user_id, status, accrual, reconciled, uploaded_at, updated_at";

/// Inserts the order unless the number is already taken, in which case the existing owner decides the result.
///
/// The insert goes first so that, inside a transaction, the write lock is taken up front.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let result = sqlx::query(
        "INSERT INTO orders (number, user_id, status) VALUES ($1, $2, $3) ON CONFLICT(number) DO NOTHING",
    )
    .bind(&order.number)
    .bind(order.user_id)
    .bind(OrderStatusType::New)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 1 {
        debug!("🗃️ Order {} has been saved for user #{}", order.number, order.user_id);
        return Ok(InsertOrderResult::Inserted(order.number));
    }
    match fetch_order(&order.number, conn).await? {
        Some(existing) if existing.user_id == order.user_id => Ok(InsertOrderResult::AlreadyExists(existing.number)),
        Some(existing) => Ok(InsertOrderResult::OwnedByAnotherUser(existing.user_id)),
        None => Err(SqliteDatabaseError::OrderNotFound(order.number)),
    }
}

pub async fn fetch_order(number: &OrderNumber, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1");
    let order = sqlx::query_as::<_, Order>(&query).bind(number).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY uploaded_at DESC, rowid DESC");
    let orders = sqlx::query_as::<_, Order>(&query).bind(user_id).fetch_all(conn).await?;
    Ok(orders)
}

pub async fn fetch_unreconciled(
    offset: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let query = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE reconciled = 0 ORDER BY uploaded_at ASC, rowid ASC LIMIT $1 OFFSET $2"
    );
    let orders = sqlx::query_as::<_, Order>(&query).bind(limit).bind(offset).fetch_all(conn).await?;
    trace!("🗃️ Fetched {} unreconciled orders (offset {offset}, limit {limit})", orders.len());
    Ok(orders)
}

/// Marks the order as processed and reconciled, recording the credited accrual. Only an order that is still
/// unreconciled is touched. Returns `true` if this call made the transition.
///
/// This is the first statement of the credit transaction. Writing first means the transaction takes the write lock
/// straight away rather than upgrading a read lock later.
pub async fn mark_reconciled(
    order: &Order,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                accrual = $2,
                reconciled = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE number = $3 AND user_id = $4 AND reconciled = 0
        "#,
    )
    .bind(OrderStatusType::Processed)
    .bind(accrual)
    .bind(&order.number)
    .bind(order.user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Writes status, accrual and the reconciled flag. A reconciled order can never be un-reconciled, and its accrual is
/// frozen at the credited amount.
pub async fn update_order(order: &Order, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                accrual = CASE WHEN reconciled THEN accrual ELSE $2 END,
                reconciled = (reconciled OR $3),
                updated_at = CURRENT_TIMESTAMP
            WHERE number = $4 AND user_id = $5
        "#,
    )
    .bind(order.status)
    .bind(order.accrual)
    .bind(order.reconciled)
    .bind(&order.number)
    .bind(order.user_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::OrderNotFound(order.number.clone()));
    }
    trace!("🗃️ Order {} updated: status {}, accrual {:?}", order.number, order.status, order.accrual);
    Ok(())
}
