use std::future::Future;

use ledger_common::Points;

use crate::{db::traits::CreditResult, db_types::Order};

/// The storage contract the reconciliation engine is built on.
///
/// The engine runs on a multithreaded runtime and hands the store to many tasks at once, so implementations must be
/// cheap to clone and every returned future must be `Send`. Implementations may use `async fn` for the methods.
pub trait OrderStore: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns up to `limit` orders that have not been reconciled, skipping the first `offset` of them.
    ///
    /// Orders are returned oldest upload first. Orders with equal upload times are returned in insertion order, so
    /// paging with a fixed offset is stable as long as nothing is reconciled in between.
    fn fetch_unreconciled(
        &self,
        offset: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Order>, Self::Error>> + Send;

    /// Credits `amount` to the owner of `order` and marks the order as reconciled, atomically.
    ///
    /// The credit is conditional on the order *still* being unreconciled in the store. If another writer got there
    /// first, nothing is changed and [`CreditResult::AlreadyReconciled`] is returned. Only the order's number and
    /// owner are read from `order`; the stored state is authoritative.
    fn credit_balance(
        &self,
        order: &Order,
        amount: Points,
    ) -> impl Future<Output = Result<CreditResult, Self::Error>> + Send;

    /// Writes the order's status, accrual and reconciled flag back to the store.
    ///
    /// An order that is already reconciled in the store stays reconciled, and keeps the accrual that was credited.
    /// Fails if no order with this number exists for this user.
    fn persist_order(&self, order: &Order) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

