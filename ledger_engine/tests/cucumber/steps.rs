use std::time::Duration;

use cucumber::{given, then, when};
use ledger_common::Points;
use ledger_engine::{
    db_types::{NewOrder, OrderNumber, OrderStatusType},
    EngineConfig,
    InsertOrderResult,
    OrderManagement,
    OrderStore,
    ReconcileError,
    ReconcileOutcome,
    ReconciliationEngine,
};

use crate::cucumber::LedgerWorld;

fn points(value: f64) -> Points {
    Points::try_from_decimal(value).expect("Not a valid points amount")
}

fn status(value: &str) -> OrderStatusType {
    value.parse().expect("Not a valid order status")
}

#[given(expr = "user {int} has uploaded order {word}")]
async fn upload_order(world: &mut LedgerWorld, user_id: i64, number: String) {
    let result = world.system().db.insert_order(NewOrder::new(number.as_str(), user_id)).await;
    assert!(matches!(result, Ok(InsertOrderResult::Inserted(_))), "Could not upload order {number}: {result:?}");
}

#[given(expr = "order {word} has already been credited with {float} points")]
async fn already_credited(world: &mut LedgerWorld, number: String, amount: f64) {
    let db = &world.system().db;
    let order = db.fetch_order(&number.into()).await.unwrap().expect("Order does not exist");
    db.credit_balance(&order, points(amount)).await.expect("Could not credit order");
}

#[given(expr = "the accrual service reports order {word} as PROCESSED with {float} points")]
async fn accrual_processed(world: &mut LedgerWorld, number: String, amount: f64) {
    world.system().accrual.processed(&number, points(amount));
}

#[given(expr = "the accrual service reports order {word} as {word}")]
async fn accrual_status(world: &mut LedgerWorld, number: String, value: String) {
    world.system().accrual.status(&number, status(&value));
}

#[given(expr = "the accrual service rate limits order {word}")]
async fn accrual_rate_limits(world: &mut LedgerWorld, number: String) {
    world.system().accrual.rate_limit(&number, None);
}

#[when(expr = "order {word} is reconciled")]
async fn reconcile_order(world: &mut LedgerWorld, number: String) {
    let system = world.system();
    let order = system.db.fetch_order(&number.into()).await.unwrap().expect("Order does not exist");
    system.last_result = Some(system.api.reconcile(&order).await);
}

#[when(expr = "the same copy of order {word} is reconciled {int} times")]
async fn reconcile_stale_copy(world: &mut LedgerWorld, number: String, times: usize) {
    let system = world.system();
    let order = system.db.fetch_order(&number.into()).await.unwrap().expect("Order does not exist");
    for _ in 0..times {
        system.last_result = Some(system.api.reconcile(&order).await);
    }
}

#[when(expr = "the reconciliation engine runs for {int}ms with a {int}ms cooldown")]
async fn run_engine(world: &mut LedgerWorld, run_for: u64, cooldown: u64) {
    let system = world.system();
    system.cooldown = Duration::from_millis(cooldown);
    let config = EngineConfig::default()
        .with_poll_interval(Duration::from_millis(50))
        .with_workers(4)
        .with_rate_limit_cooldown(system.cooldown);
    let engine = ReconciliationEngine::new(system.db.clone(), system.accrual.clone(), config).start();
    tokio::time::sleep(Duration::from_millis(run_for)).await;
    engine.shutdown().await;
}

#[then(expr = "order {word} has status {word}")]
async fn check_status(world: &mut LedgerWorld, number: String, value: String) {
    let order = world.system().db.fetch_order(&number.clone().into()).await.unwrap().expect("Order does not exist");
    assert_eq!(order.status, status(&value), "Wrong status for order {number}");
}

#[then(expr = "order {word} is reconciled with {float} points")]
async fn check_reconciled(world: &mut LedgerWorld, number: String, amount: f64) {
    let order = world.system().db.fetch_order(&number.clone().into()).await.unwrap().expect("Order does not exist");
    assert!(order.reconciled, "Order {number} is not reconciled");
    assert_eq!(order.accrual, Some(points(amount)));
}

#[then(expr = "order {word} is not reconciled")]
async fn check_not_reconciled(world: &mut LedgerWorld, number: String) {
    let order = world.system().db.fetch_order(&number.clone().into()).await.unwrap().expect("Order does not exist");
    assert!(!order.reconciled, "Order {number} should not be reconciled");
}

#[then(expr = "user {int} has a balance of {float} points")]
async fn check_balance(world: &mut LedgerWorld, user_id: i64, amount: f64) {
    let balance = world.system().db.fetch_balance(user_id).await.unwrap();
    assert_eq!(balance.current, points(amount), "Wrong balance for user #{user_id}");
}

#[then("the reconciliation was rate limited")]
async fn check_rate_limited(world: &mut LedgerWorld) {
    let result = world.system().last_result.as_ref().expect("Nothing has been reconciled");
    assert!(matches!(result, Err(ReconcileError::RateLimited { .. })), "Expected a rate limit, got {result:?}");
}

#[then("no credit was applied")]
async fn check_no_credit(world: &mut LedgerWorld) {
    let result = world.system().last_result.as_ref().expect("Nothing has been reconciled");
    assert!(
        matches!(result, Ok(ReconcileOutcome::AlreadyCredited | ReconcileOutcome::Updated | ReconcileOutcome::Unchanged)),
        "Expected no credit, got {result:?}"
    );
}

#[then(expr = "the accrual service was asked about order {word} {int} times")]
async fn check_calls(world: &mut LedgerWorld, number: String, times: usize) {
    assert_eq!(world.system().accrual.calls_for(&number), times);
}

#[then("nothing was sent to the accrual service during the cooldown")]
async fn check_cooldown(world: &mut LedgerWorld) {
    let system = world.system();
    let calls = system.accrual.calls_with_time();
    let (trigger, started) = calls.first().cloned().expect("The accrual service was never called");
    let during = calls[1..]
        .iter()
        .filter(|(_, t)| *t - started < system.cooldown)
        .map(|(n, _)| n)
        .collect::<Vec<&OrderNumber>>();
    assert!(during.is_empty(), "Orders {during:?} were sent during the cooldown triggered by {trigger}");
}

#[then("no unreconciled orders remain")]
async fn check_all_reconciled(world: &mut LedgerWorld) {
    let remaining = world.system().db.fetch_unreconciled(0, 100).await.unwrap();
    assert!(remaining.is_empty(), "{} orders are still unreconciled", remaining.len());
}
