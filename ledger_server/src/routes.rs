//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
use actix_web::{get, web, HttpResponse, Responder};
use ledger_engine::EngineMonitor;
use log::*;

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Reports whether reconciliation is running or suspended by a rate-limit cooldown, along with the engine's counters.
#[get("/status")]
pub async fn status(monitor: web::Data<EngineMonitor>) -> impl Responder {
    trace!("💻️ Received status request");
    HttpResponse::Ok().json(monitor.status())
}
