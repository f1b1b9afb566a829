//! Loyalty Ledger Engine
//!
//! Users submit order numbers; an external accrual service decides, in its own time, how many loyalty points each
//! order earns. This library keeps the local ledger in step with those decisions and credits each user's balance
//! exactly once per order.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`mod@db`]). The [`OrderStore`] trait is the contract the reconciliation engine relies
//!    on, and [`OrderManagement`] covers order intake and lookups. SQLite is the supported backend.
//! 2. The reconciliation engine ([`mod@reconciliation`]). A dispatcher polls the store for unreconciled orders, a pool
//!    of workers asks the accrual service about each one and applies the result, and a backpressure controller
//!    pauses everything for a cooldown when the accrual service starts rate limiting us.
//! 3. Events ([`mod@events`]). Credits, order changes and backpressure transitions are published to any hooks that
//!    have been registered.
mod db;

pub mod db_types;
pub mod events;
pub mod reconciliation;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{CreditResult, InsertOrderResult, OrderManagement, OrderStore};
pub use reconciliation::{
    AccrualService,
    CursorPolicy,
    EngineConfig,
    EngineHandle,
    EngineMonitor,
    EngineState,
    EngineStatus,
    ReconcileError,
    ReconcileOutcome,
    ReconciliationApi,
    ReconciliationEngine,
};
