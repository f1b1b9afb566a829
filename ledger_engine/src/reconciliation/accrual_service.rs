use std::future::Future;

use accrual_tools::{AccrualApi, AccrualApiError};
use log::warn;

use crate::db_types::{AccrualDecision, OrderNumber};

/// Anything that can tell the engine what the accrual service currently thinks of an order.
///
/// [`AccrualApi`] is the production implementation. The returned future must be `Send` because workers run on a
/// multithreaded runtime.
pub trait AccrualService: Send + Sync + 'static {
    fn fetch_decision(
        &self,
        number: &OrderNumber,
    ) -> impl Future<Output = Result<AccrualDecision, AccrualApiError>> + Send;
}

impl AccrualService for AccrualApi {
    async fn fetch_decision(&self, number: &OrderNumber) -> Result<AccrualDecision, AccrualApiError> {
        let order = self.get_order(number.as_str()).await?;
        if order.order != number.as_str() {
            warn!("🌐️ Asked the accrual service about order {number}, but the reply is for order {}", order.order);
            return Err(AccrualApiError::RestResponseError(format!(
                "Expected a reply for order {number}, got one for order {}",
                order.order
            )));
        }
        Ok(AccrualDecision::from(order))
    }
}
