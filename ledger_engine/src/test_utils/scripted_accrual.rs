use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use accrual_tools::AccrualApiError;
use ledger_common::Points;
use tokio::time::Instant;

use crate::{
    db_types::{AccrualDecision, OrderNumber, OrderStatusType},
    reconciliation::AccrualService,
};

type Response = Result<AccrualDecision, AccrualApiError>;

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<OrderNumber, VecDeque<Response>>,
    calls: Vec<(OrderNumber, Instant)>,
    latency: Duration,
}

/// An [`AccrualService`] that replays scripted responses.
///
/// Responses for an order are returned in the order they were added. The last one is repeated for every call after
/// that. Orders without a script are reported as not registered. Every call is logged along with the (tokio) time it
/// was made, so tests running with paused time can check exactly when the accrual service was asked.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAccrual {
    script: Arc<Mutex<Script>>,
}

impl ScriptedAccrual {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().expect("ScriptedAccrual mutex poisoned")
    }

    /// Every call waits this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.script().latency = latency;
        self
    }

    pub fn respond(&self, number: &str, response: Response) -> &Self {
        self.script().responses.entry(number.into()).or_default().push_back(response);
        self
    }

    pub fn processed(&self, number: &str, accrual: Points) -> &Self {
        self.respond(number, Ok(AccrualDecision::new(OrderStatusType::Processed, Some(accrual))))
    }

    pub fn status(&self, number: &str, status: OrderStatusType) -> &Self {
        self.respond(number, Ok(AccrualDecision::new(status, None)))
    }

    pub fn rate_limit(&self, number: &str, retry_after: Option<Duration>) -> &Self {
        self.respond(number, Err(AccrualApiError::RateLimited { retry_after }))
    }

    pub fn fail(&self, number: &str, error: AccrualApiError) -> &Self {
        self.respond(number, Err(error))
    }

    /// Every order number asked about, in order.
    pub fn calls(&self) -> Vec<OrderNumber> {
        self.script().calls.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn calls_with_time(&self) -> Vec<(OrderNumber, Instant)> {
        self.script().calls.clone()
    }

    pub fn calls_for(&self, number: &str) -> usize {
        let number = OrderNumber::from(number);
        self.script().calls.iter().filter(|(n, _)| n == &number).count()
    }

    fn next_response(&self, number: &OrderNumber) -> (Response, Duration) {
        let mut script = self.script();
        script.calls.push((number.clone(), Instant::now()));
        let latency = script.latency;
        let response = match script.responses.get_mut(number) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let response =
            response.unwrap_or_else(|| Err(AccrualApiError::OrderNotRegistered(number.as_str().to_string())));
        (response, latency)
    }
}

impl AccrualService for ScriptedAccrual {
    async fn fetch_decision(&self, number: &OrderNumber) -> Result<AccrualDecision, AccrualApiError> {
        let (response, latency) = self.next_response(number);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}
