use std::fmt::Display;

use ledger_common::Points;
use serde::{Deserialize, Serialize};

use crate::helpers::deserialize_optional_points;

/// The accrual service's view of an order's calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// The order is known to the accrual service, but the calculation has not started.
    Registered,
    /// The order will never earn points.
    Invalid,
    /// The calculation is under way.
    Processing,
    /// The calculation is final.
    Processed,
}

impl Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccrualStatus::Registered => write!(f, "REGISTERED"),
            AccrualStatus::Invalid => write!(f, "INVALID"),
            AccrualStatus::Processing => write!(f, "PROCESSING"),
            AccrualStatus::Processed => write!(f, "PROCESSED"),
        }
    }
}

/// Body of a `200 OK` response from `GET /api/orders/{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualOrder {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, deserialize_with = "deserialize_optional_points", skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
}

impl AccrualOrder {
    pub fn new(order: &str, status: AccrualStatus) -> Self {
        Self { order: order.to_string(), status, accrual: None }
    }

    pub fn with_accrual(mut self, accrual: Points) -> Self {
        self.accrual = Some(accrual);
        self
    }
}
