use ledger_common::Points;

use crate::db_types::OrderNumber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted(OrderNumber),
    /// The same user uploaded this order number before.
    AlreadyExists(OrderNumber),
    /// Another user already owns this order number. The value is the owner's user id.
    OwnedByAnotherUser(i64),
}

/// The result of [`crate::OrderStore::credit_balance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditResult {
    /// The balance was credited. The value is the user's new current balance.
    Credited(Points),
    /// The order had already been reconciled by the time the credit was attempted, so nothing was changed.
    AlreadyReconciled,
}
