use std::time::Duration;

use actix_web::{http::StatusCode, web};
use ledger_common::Points;
use ledger_engine::{
    db_types::NewOrder,
    test_utils::{MemoryStore, ScriptedAccrual},
    EngineConfig,
    EngineState,
    OrderManagement,
    ReconciliationEngine,
};
use serde_json::Value;

use super::helpers::{get_request, wait_for};
use crate::routes::{health, status};

fn config() -> EngineConfig {
    EngineConfig::default().with_poll_interval(Duration::from_millis(20)).with_workers(2)
}

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init();
    let (code, body) = get_request("/health", |cfg| {
        cfg.service(health);
    })
    .await
    .expect("Failed to make request");
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn status_reports_counters() {
    let _ = env_logger::try_init();
    let store = MemoryStore::default();
    store.insert_order(NewOrder::new("1001", 1)).await.unwrap();
    store.insert_order(NewOrder::new("1002", 2)).await.unwrap();
    let accrual = ScriptedAccrual::default();
    accrual.processed("1001", Points::from(1550)).processed("1002", Points::from(300));

    let engine = ReconciliationEngine::new(store.clone(), accrual, config()).start();
    wait_for(&engine, |e| e.status().credited == 2).await;

    let monitor = engine.monitor();
    let (code, body) = get_request("/status", move |cfg| {
        cfg.app_data(web::Data::new(monitor)).service(status);
    })
    .await
    .expect("Failed to make request");
    assert_eq!(code, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["state"], "running");
    assert_eq!(json["credited"], 2);
    assert_eq!(json["rate_limited"], 0);
    assert!(json["dispatched"].as_u64().unwrap() >= 2);
    assert_eq!(store.balance(1).current, Points::from(1550));
    engine.shutdown().await;
}

#[actix_web::test]
async fn status_reports_a_suspended_engine() {
    let _ = env_logger::try_init();
    let store = MemoryStore::default();
    store.insert_order(NewOrder::new("2001", 7)).await.unwrap();
    let accrual = ScriptedAccrual::default();
    accrual.rate_limit("2001", None);

    let engine = ReconciliationEngine::new(store, accrual, config()).start();
    wait_for(&engine, |e| e.state() == EngineState::Suspended).await;

    let monitor = engine.monitor();
    let (code, body) = get_request("/status", move |cfg| {
        cfg.app_data(web::Data::new(monitor)).service(status);
    })
    .await
    .expect("Failed to make request");
    assert_eq!(code, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["state"], "suspended");
    assert!(json["rate_limited"].as_u64().unwrap() >= 1);
    assert_eq!(json["credited"], 0);
    // The default cooldown is a minute; shutdown must not wait for it
    engine.shutdown().await;
}
