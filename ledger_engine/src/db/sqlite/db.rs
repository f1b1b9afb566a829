use std::fmt::Debug;

use ledger_common::Points;
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{balances, new_pool, orders, SqliteDatabaseError};
use crate::{
    db::traits::{CreditResult, InsertOrderResult, OrderManagement, OrderStore},
    db_types::{Balance, NewOrder, Order, OrderNumber},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        debug!("🗃️ Database connection pool closed");
    }
}

impl OrderStore for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_unreconciled(&self, offset: i64, limit: i64) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_unreconciled(offset, limit, &mut conn).await
    }

    /// In a single atomic transaction,
    /// * flips the order's `reconciled` flag, but only if it is still unset,
    /// * adds `amount` to the owner's current balance if the flag was flipped.
    ///
    /// If the flag was already set, the transaction is rolled back and nothing changes.
    async fn credit_balance(&self, order: &Order, amount: Points) -> Result<CreditResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        if !orders::mark_reconciled(order, amount, &mut tx).await? {
            tx.rollback().await?;
            debug!("🗃️ Order {} was already reconciled. No credit applied.", order.number);
            return Ok(CreditResult::AlreadyReconciled);
        }
        let balance = balances::credit(order.user_id, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(CreditResult::Credited(balance))
    }

    async fn persist_order(&self, order: &Order) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(order, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(number, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(user_id, &mut conn).await
    }

    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        balances::fetch_balance(user_id, &mut conn).await
    }
}
