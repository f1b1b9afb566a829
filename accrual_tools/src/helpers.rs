use ledger_common::Points;
use serde::{Deserialize, Deserializer};

/// Deserializes an optional decimal amount (e.g. `15.5`) into [`Points`].
pub fn deserialize_optional_points<'de, D>(deserializer: D) -> Result<Option<Points>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<f64>::deserialize(deserializer)?;
    value.map(Points::try_from_decimal).transpose().map_err(serde::de::Error::custom)
}

/// Accepts `host:port`, `http://host:port` or `https://host:port/prefix` and returns a URL with a scheme and without
/// a trailing slash.
pub fn normalise_base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}
