use std::{future::Future, pin::Pin};

use accrual_tools::AccrualApi;
use ledger_engine::{
    events::{BackpressureEvent, EventHandlers, EventHooks, OrderCreditedEvent, OrderModifiedEvent},
    EngineConfig,
    EngineHandle,
    ReconciliationEngine,
    SqliteDatabase,
};
use log::*;

const EVENT_BUFFER_SIZE: usize = 128;

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Starts the reconciliation engine against the ledger database. The engine runs until [`EngineHandle::shutdown`] is
/// called.
pub fn start_reconciler(db: SqliteDatabase, accrual: AccrualApi, config: EngineConfig) -> EngineHandle {
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers();
    ReconciliationEngine::new(db, accrual, config).with_producers(producers).start()
}

/// Hooks that write each engine event to the log.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_credited(|ev: OrderCreditedEvent| {
            Box::pin(async move {
                info!(
                    "📬️ User #{} earned {} points for order {}. New balance: {}",
                    ev.order.user_id, ev.amount, ev.order.number, ev.balance
                );
            }) as HookFuture
        })
        .on_order_modified(|ev: OrderModifiedEvent| {
            Box::pin(async move {
                debug!(
                    "📬️ Order {} changed from {} to {}",
                    ev.new_order.number, ev.old_order.status, ev.new_order.status
                );
            }) as HookFuture
        })
        .on_backpressure(|ev: BackpressureEvent| {
            Box::pin(async move {
                match ev {
                    BackpressureEvent::Suspended { trigger, cooldown } => warn!(
                        "📬️ Reconciliation suspended for {}s after order {trigger} was rate limited",
                        cooldown.as_secs_f64()
                    ),
                    BackpressureEvent::Resumed { coalesced } => {
                        info!("📬️ Reconciliation resumed. {coalesced} further rate-limit signals were coalesced")
                    },
                }
            }) as HookFuture
        });
    hooks
}
