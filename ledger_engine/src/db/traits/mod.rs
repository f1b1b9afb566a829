//! #  Database management and control.
//!
//! This module provides the interface contracts that storage *backends* must satisfy.
//!
//! ## Orders and balances
//! An order belongs to exactly one user. Its status and accrual mirror what the accrual service last said about it,
//! and its `reconciled` flag records whether the accrual has been credited to the owner's balance. The flag only
//! ever moves from `false` to `true`.
//!
//! ## Traits
//! * [`OrderStore`] is what the reconciliation engine needs: page through unreconciled orders, credit a balance, and
//!   persist an updated order.
//! * [`OrderManagement`] covers order intake and read-only queries used by the server and the tests.
mod data_objects;
mod order_management;
mod order_store;

pub use data_objects::{CreditResult, InsertOrderResult};
pub use order_management::OrderManagement;
pub use order_store::OrderStore;
