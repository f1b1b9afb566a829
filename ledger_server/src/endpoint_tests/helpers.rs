use std::time::Duration;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use ledger_engine::EngineHandle;
use log::debug;

pub async fn get_request<F>(path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    let req = TestRequest::get().uri(path).to_request();
    let app = App::new().configure(configure);

    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = res.into_body().try_into_bytes().map_err(|_| "Could not read response body".to_string())?;
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

/// Polls the engine until `done` holds, giving up after two seconds.
pub async fn wait_for<F>(engine: &EngineHandle, done: F)
where F: Fn(&EngineHandle) -> bool {
    for _ in 0..100 {
        if done(engine) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Timed out waiting for the engine. Last status: {:?}", engine.status());
}
