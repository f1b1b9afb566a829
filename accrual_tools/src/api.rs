use std::sync::Arc;

use ledger_common::helpers::parse_retry_after;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER},
    Client,
    StatusCode,
    Url,
};

use crate::{config::AccrualConfig, AccrualApiError, AccrualOrder};

#[derive(Clone)]
pub struct AccrualApi {
    config: AccrualConfig,
    base: Url,
    client: Arc<Client>,
}

impl std::fmt::Debug for AccrualApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccrualApi({})", self.config.base_url)
    }
}

impl AccrualApi {
    pub fn new(config: AccrualConfig) -> Result<Self, AccrualApiError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| AccrualApiError::Initialization(format!("Invalid base URL {}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(AccrualApiError::Initialization(format!("{} cannot be used as a base URL", config.base_url)));
        }
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self { config, base, client: Arc::new(client) })
    }

    pub fn config(&self) -> &AccrualConfig {
        &self.config
    }

    /// The URL that is queried for the given order number. The number is added as a single, escaped path segment.
    pub fn order_url(&self, number: &str) -> Url {
        let mut url = self.base.clone();
        // `new` rejects base URLs that cannot hold path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "orders", number]);
        }
        url
    }

    /// Asks the accrual service for its current decision on the given order.
    ///
    /// Exactly one request is made.
    /// * `200 OK` is parsed into an [`AccrualOrder`].
    /// * `204 No Content` means the service has never heard of the order: [`AccrualApiError::OrderNotRegistered`].
    /// * `429 Too Many Requests` yields [`AccrualApiError::RateLimited`], along with the `Retry-After` delay if the
    ///   service supplied one.
    /// * Any other status is a [`AccrualApiError::QueryError`]; transport failures and timeouts are
    ///   [`AccrualApiError::RestResponseError`].
    pub async fn get_order(&self, number: &str) -> Result<AccrualOrder, AccrualApiError> {
        let url = self.order_url(number);
        trace!("🌐️ Querying accrual service: {url}");
        let response =
            self.client.get(url).send().await.map_err(|e| AccrualApiError::RestResponseError(e.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                let order =
                    response.json::<AccrualOrder>().await.map_err(|e| AccrualApiError::JsonError(e.to_string()))?;
                debug!("🌐️ Order {number} is {} with accrual {:?}", order.status, order.accrual);
                Ok(order)
            },
            StatusCode::NO_CONTENT => Err(AccrualApiError::OrderNotRegistered(number.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after =
                    response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()).and_then(parse_retry_after);
                warn!("🌐️ Accrual service rate limit hit while querying order {number}. Retry after: {retry_after:?}");
                Err(AccrualApiError::RateLimited { retry_after })
            },
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(AccrualApiError::QueryError { status: status.as_u16(), message })
            },
        }
    }
}
