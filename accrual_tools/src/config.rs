use std::time::Duration;

use log::*;

use crate::helpers::normalise_base_url;

const DEFAULT_ACCRUAL_ADDRESS: &str = "http://127.0.0.1:8081";
const DEFAULT_ACCRUAL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AccrualConfig {
    /// Base URL of the accrual service, e.g. `http://127.0.0.1:8081`. Requests go to `{base_url}/api/orders/{number}`.
    pub base_url: String,
    /// Per-request timeout. A request that takes longer fails like any other transport error.
    pub timeout: Duration,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_ACCRUAL_ADDRESS.to_string(), timeout: DEFAULT_ACCRUAL_TIMEOUT }
    }
}

impl AccrualConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: normalise_base_url(base_url), ..Default::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("LPG_ACCRUAL_SYSTEM_ADDRESS").map(|s| normalise_base_url(&s)).unwrap_or_else(|_| {
            warn!("🪛️ LPG_ACCRUAL_SYSTEM_ADDRESS not set, using {DEFAULT_ACCRUAL_ADDRESS} as default");
            DEFAULT_ACCRUAL_ADDRESS.to_string()
        });
        let timeout = std::env::var("LPG_ACCRUAL_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for LPG_ACCRUAL_TIMEOUT. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_ACCRUAL_TIMEOUT);
        Self { base_url, timeout }
    }
}
