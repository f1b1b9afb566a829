use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The accrual service is rate limiting requests. Retry after: {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Order {0} is not registered with the accrual service")]
    OrderNotRegistered(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
}

impl AccrualApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
