use std::{fmt::Display, str::FromStr};

use accrual_tools::{AccrualOrder, AccrualStatus};
use chrono::{DateTime, Utc};
use ledger_common::Points;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------     OrderNumber       -------------------------------------------------------
/// The identifier users submit. It is treated as opaque text; validation (Luhn etc.) happens at intake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OrderNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been uploaded, but the accrual service has not said anything about it yet.
    New,
    /// The accrual service is still working on the order.
    Processing,
    /// The accrual service rejected the order. It will never earn points.
    Invalid,
    /// The accrual service has made its final decision.
    Processed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "NEW"),
            OrderStatusType::Processing => write!(f, "PROCESSING"),
            OrderStatusType::Invalid => write!(f, "INVALID"),
            OrderStatusType::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

/// The accrual service's `REGISTERED` has no local counterpart. From the ledger's point of view a registered order is
/// already being processed.
impl From<AccrualStatus> for OrderStatusType {
    fn from(value: AccrualStatus) -> Self {
        match value {
            AccrualStatus::Registered | AccrualStatus::Processing => Self::Processing,
            AccrualStatus::Invalid => Self::Invalid,
            AccrualStatus::Processed => Self::Processed,
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Order {
    pub number: OrderNumber,
    pub user_id: i64,
    pub status: OrderStatusType,
    pub accrual: Option<Points>,
    /// Set exactly once, in the same transaction that credits the accrual to the user's balance.
    pub reconciled: bool,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the amount that should be credited for this order, if any. Only processed orders that carry an accrual
    /// and have not been credited before qualify.
    pub fn creditable_amount(&self) -> Option<Points> {
        match (self.status, self.accrual, self.reconciled) {
            (OrderStatusType::Processed, Some(amount), false) => Some(amount),
            _ => None,
        }
    }

    /// True if `other` differs from this order in any field the reconciliation procedure may touch.
    pub fn differs_from(&self, other: &Order) -> bool {
        self.status != other.status || self.accrual != other.accrual || self.reconciled != other.reconciled
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub user_id: i64,
}

impl NewOrder {
    pub fn new<N: Into<OrderNumber>>(number: N, user_id: i64) -> Self {
        Self { number: number.into(), user_id }
    }
}

//--------------------------------------    AccrualDecision    -------------------------------------------------------
/// What the accrual service currently says about an order, expressed in ledger terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualDecision {
    pub status: OrderStatusType,
    pub accrual: Option<Points>,
}

impl AccrualDecision {
    pub fn new(status: OrderStatusType, accrual: Option<Points>) -> Self {
        Self { status, accrual }
    }
}

impl From<AccrualOrder> for AccrualDecision {
    fn from(value: AccrualOrder) -> Self {
        Self { status: value.status.into(), accrual: value.accrual }
    }
}

//--------------------------------------        Balance        -------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize)]
pub struct Balance {
    pub user_id: i64,
    pub current: Points,
    pub withdrawn: Points,
}

impl Balance {
    pub fn empty(user_id: i64) -> Self {
        Self { user_id, ..Default::default() }
    }
}
