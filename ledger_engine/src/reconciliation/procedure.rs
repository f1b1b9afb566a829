use std::{fmt::Debug, time::Duration};

use accrual_tools::AccrualApiError;
use ledger_common::Points;
use log::*;
use thiserror::Error;

use crate::{
    db::traits::{CreditResult, OrderStore},
    db_types::Order,
    events::{EventProducers, OrderCreditedEvent, OrderModifiedEvent},
    reconciliation::AccrualService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The accrual was credited. `balance` is the owner's current balance afterwards.
    Credited { amount: Points, balance: Points },
    /// The order qualified for a credit, but the store showed it had already been credited. Nothing was credited.
    AlreadyCredited,
    /// The order's status or accrual changed and was saved.
    Updated,
    /// The accrual service had nothing new to say.
    Unchanged,
}

#[derive(Debug, Error)]
pub enum ReconcileError<E: std::error::Error> {
    #[error("The accrual service is rate limiting requests")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Could not fetch the accrual decision: {0}")]
    Accrual(AccrualApiError),
    #[error("Could not credit the balance: {0}")]
    CreditFailed(E),
    #[error("Could not save the order: {0}")]
    PersistFailed(E),
}

impl<E: std::error::Error> From<AccrualApiError> for ReconcileError<E> {
    fn from(e: AccrualApiError) -> Self {
        match e {
            AccrualApiError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            e => Self::Accrual(e),
        }
    }
}

/// `ReconciliationApi` brings a single order in line with the accrual service.
///
/// It is stateless apart from the store and the accrual client, so one instance is shared by every worker.
pub struct ReconciliationApi<S, A> {
    store: S,
    accrual: A,
    producers: EventProducers,
}

impl<S, A> Debug for ReconciliationApi<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<S, A> ReconciliationApi<S, A> {
    pub fn new(store: S, accrual: A, producers: EventProducers) -> Self {
        Self { store, accrual, producers }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, A> ReconciliationApi<S, A>
where
    S: OrderStore,
    A: AccrualService,
{
    /// Reconciles one order.
    ///
    /// 1. Asks the accrual service for its current decision. Any failure ends the procedure here without touching the
    ///    store. Rate limiting is reported as [`ReconcileError::RateLimited`] so the caller can back off.
    /// 2. Copies the decision's status and accrual onto a working copy of the order.
    /// 3. If the order is now `PROCESSED` with an accrual and `order` was not yet reconciled, credits the owner and
    ///    marks the order reconciled in one conditional transaction. If the credit fails, nothing is saved.
    /// 4. Saves the working copy.
    ///
    /// `order` may be a stale snapshot. The conditional credit in step 3 makes sure that running this more than once
    /// for the same order never credits it twice.
    pub async fn reconcile(&self, order: &Order) -> Result<ReconcileOutcome, ReconcileError<S::Error>> {
        let decision = self.accrual.fetch_decision(&order.number).await?;
        trace!("🧾️ Order {}: accrual service says {} ({:?})", order.number, decision.status, decision.accrual);
        let mut update = order.clone();
        update.status = decision.status;
        update.accrual = decision.accrual;

        let mut outcome = None;
        if let Some(amount) = update.creditable_amount() {
            update.reconciled = true;
            match self.store.credit_balance(order, amount).await.map_err(ReconcileError::CreditFailed)? {
                CreditResult::Credited(balance) => {
                    info!("🧾️ Credited {amount} points to user #{} for order {}", order.user_id, order.number);
                    let event = OrderCreditedEvent::new(update.clone(), amount, balance);
                    self.producers.publish_order_credited(event).await;
                    outcome = Some(ReconcileOutcome::Credited { amount, balance });
                },
                CreditResult::AlreadyReconciled => {
                    warn!("🧾️ Order {} was credited in the meantime. Not crediting it again.", order.number);
                    outcome = Some(ReconcileOutcome::AlreadyCredited);
                },
            }
        }
        if order.reconciled {
            // The credited amount is final
            update.accrual = order.accrual;
        }

        self.store.persist_order(&update).await.map_err(ReconcileError::PersistFailed)?;
        let modified = order.differs_from(&update);
        if modified {
            debug!("🧾️ Order {} updated: {} -> {}", order.number, order.status, update.status);
            self.producers.publish_order_modified(OrderModifiedEvent::new(order.clone(), update)).await;
        }
        Ok(outcome.unwrap_or(if modified { ReconcileOutcome::Updated } else { ReconcileOutcome::Unchanged }))
    }
}
