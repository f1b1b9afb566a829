use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use actix_web::{dev::ServerHandle, web, App, HttpResponse, HttpServer};
use serde_json::Value;

#[derive(Clone, Debug)]
pub enum MockResponse {
    Json(Value),
    Status(u16),
    RateLimited(Option<u64>),
}

#[derive(Clone, Default)]
struct MockState {
    responses: Arc<HashMap<String, MockResponse>>,
    hits: Arc<AtomicUsize>,
}

pub struct MockAccrualServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    handle: ServerHandle,
}

impl MockAccrualServer {
    /// Starts a mock accrual service on a random local port. Must be called from within an actix runtime.
    pub async fn start(responses: HashMap<String, MockResponse>) -> Self {
        let state = MockState { responses: Arc::new(responses), hits: Arc::new(AtomicUsize::new(0)) };
        let hits = state.hits.clone();
        let server = HttpServer::new(move || {
            App::new().app_data(web::Data::new(state.clone())).route("/api/orders/{number}", web::get().to(order))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("Could not bind mock accrual server");
        let port = server.addrs()[0].port();
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        Self { url: format!("http://127.0.0.1:{port}"), hits, handle }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

async fn order(path: web::Path<String>, state: web::Data<MockState>) -> HttpResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let number = path.into_inner();
    match state.responses.get(&number) {
        Some(MockResponse::Json(body)) => HttpResponse::Ok().json(body),
        Some(MockResponse::Status(code)) => {
            let status = actix_web::http::StatusCode::from_u16(*code).expect("Invalid status code");
            HttpResponse::build(status).body("mock error")
        },
        Some(MockResponse::RateLimited(retry_after)) => {
            let mut response = HttpResponse::TooManyRequests();
            if let Some(secs) = retry_after {
                response.insert_header(("Retry-After", secs.to_string()));
            }
            response.body("No more than N requests per minute allowed")
        },
        None => HttpResponse::NoContent().finish(),
    }
}
