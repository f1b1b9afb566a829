//! In-memory and scripted stand-ins for the store and the accrual service, plus helpers for setting up SQLite test
//! databases.
mod memory_store;
#[cfg(feature = "sqlite")]
pub mod prepare_env;
mod scripted_accrual;

use chrono::Utc;
pub use memory_store::{MemoryStore, MemoryStoreError};
pub use scripted_accrual::ScriptedAccrual;

use crate::db_types::{Order, OrderStatusType};

/// A fresh `NEW`, unreconciled order.
pub fn new_order(number: &str, user_id: i64) -> Order {
    let now = Utc::now();
    Order {
        number: number.into(),
        user_id,
        status: OrderStatusType::New,
        accrual: None,
        reconciled: false,
        uploaded_at: now,
        updated_at: now,
    }
}
