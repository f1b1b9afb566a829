use std::time::Duration;

use ledger_common::Points;

use crate::db_types::{Order, OrderNumber};

/// An order's accrual has been credited to its owner's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreditedEvent {
    pub order: Order,
    pub amount: Points,
    /// The owner's current balance after the credit.
    pub balance: Points,
}

impl OrderCreditedEvent {
    pub fn new(order: Order, amount: Points, balance: Points) -> Self {
        Self { order, amount, balance }
    }
}

/// The accrual service reported something new about an order, and the change has been saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderModifiedEvent {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderModifiedEvent {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackpressureEvent {
    /// Reconciliation has been paused because the accrual service rate limited a request for `trigger`.
    Suspended { trigger: OrderNumber, cooldown: Duration },
    /// The cooldown has elapsed. `coalesced` further rate-limit signals arrived while suspended and were folded into
    /// the same cooldown.
    Resumed { coalesced: usize },
}

