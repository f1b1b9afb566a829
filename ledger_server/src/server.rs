use std::time::Duration;

use accrual_tools::AccrualApi;
use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use ledger_engine::{EngineMonitor, SqliteDatabase};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    reconciler::start_reconciler,
    routes::{health, status},
};

const MAX_DB_CONNECTIONS: u32 = 25;

/// Opens the ledger database, starts the reconciliation engine and serves the operations API until the process is
/// asked to stop. The engine is then shut down, letting in-progress orders finish, before the database is closed.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS).await?;
    if config.run_migrations {
        db.migrate().await?;
        info!("🚀️ Database migrations complete");
    }
    let accrual = AccrualApi::new(config.accrual.clone())?;
    info!("🚀️ Using the accrual service at {}", config.accrual.base_url);
    let engine = start_reconciler(db.clone(), accrual, config.engine.clone());
    let result = match create_server_instance(&config, engine.monitor()) {
        Ok(srv) => srv.await.map_err(|e| ServerError::Unspecified(e.to_string())),
        Err(e) => Err(e),
    };
    info!("🚀️ HTTP server stopped. Shutting down the reconciliation engine");
    engine.shutdown().await;
    db.close().await;
    result
}

pub fn create_server_instance(config: &ServerConfig, monitor: EngineMonitor) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("lpg::access_log"))
            .app_data(web::Data::new(monitor.clone()))
            .service(health)
            .service(status)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
