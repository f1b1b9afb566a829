use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use ledger_common::Points;
use thiserror::Error;

use crate::{
    db::traits::{CreditResult, InsertOrderResult, OrderManagement, OrderStore},
    db_types::{Balance, NewOrder, Order, OrderNumber, OrderStatusType},
};

#[derive(Debug, Clone, Error)]
pub enum MemoryStoreError {
    #[error("Injected failure in {0}")]
    Injected(&'static str),
    #[error("Order {0} does not exist for this user")]
    OrderNotFound(OrderNumber),
}

#[derive(Debug, Default)]
struct State {
    // Kept in insertion order, which doubles as upload order
    orders: Vec<Order>,
    balances: HashMap<i64, Balance>,
    credits: Vec<(OrderNumber, Points)>,
    fetch_offsets: Vec<i64>,
    persist_count: usize,
    fail_fetches: usize,
    fail_credits: usize,
    fail_persists: usize,
}

impl State {
    fn find_mut(&mut self, number: &OrderNumber, user_id: i64) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| &o.number == number && o.user_id == user_id)
    }

    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

/// An [`OrderStore`] that keeps everything in memory, with the same conditional-credit semantics as the SQLite
/// backend. Failures can be injected into fetches, credits and persists, and every credit is recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("MemoryStore mutex poisoned")
    }

    /// Adds an order exactly as given.
    pub fn add_order(&self, order: Order) {
        self.state().orders.push(order);
    }

    pub fn order(&self, number: &OrderNumber) -> Option<Order> {
        self.state().orders.iter().find(|o| &o.number == number).cloned()
    }

    /// Marks an order as processed and reconciled with the given accrual, without touching any balance.
    pub fn force_reconciled(&self, number: &OrderNumber, accrual: Points) {
        let mut state = self.state();
        let order = state.orders.iter_mut().find(|o| &o.number == number).expect("No such order");
        order.status = OrderStatusType::Processed;
        order.accrual = Some(accrual);
        order.reconciled = true;
    }

    pub fn balance(&self, user_id: i64) -> Balance {
        self.state().balances.get(&user_id).copied().unwrap_or_else(|| Balance::empty(user_id))
    }

    /// Every successful credit, in the order it happened.
    pub fn credits(&self) -> Vec<(OrderNumber, Points)> {
        self.state().credits.clone()
    }

    /// The offset of every `fetch_unreconciled` call, including failed ones.
    pub fn fetch_offsets(&self) -> Vec<i64> {
        self.state().fetch_offsets.clone()
    }

    /// The number of successful `persist_order` calls.
    pub fn persist_count(&self) -> usize {
        self.state().persist_count
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.state().fail_fetches = count;
    }

    pub fn fail_next_credits(&self, count: usize) {
        self.state().fail_credits = count;
    }

    pub fn fail_next_persists(&self, count: usize) {
        self.state().fail_persists = count;
    }
}

impl OrderStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn fetch_unreconciled(&self, offset: i64, limit: i64) -> Result<Vec<Order>, Self::Error> {
        let mut state = self.state();
        state.fetch_offsets.push(offset);
        if State::take_failure(&mut state.fail_fetches) {
            return Err(MemoryStoreError::Injected("fetch_unreconciled"));
        }
        let page = state
            .orders
            .iter()
            .filter(|o| !o.reconciled)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(page)
    }

    async fn credit_balance(&self, order: &Order, amount: Points) -> Result<CreditResult, Self::Error> {
        let mut state = self.state();
        if State::take_failure(&mut state.fail_credits) {
            return Err(MemoryStoreError::Injected("credit_balance"));
        }
        let Some(stored) = state.find_mut(&order.number, order.user_id) else {
            return Err(MemoryStoreError::OrderNotFound(order.number.clone()));
        };
        if stored.reconciled {
            return Ok(CreditResult::AlreadyReconciled);
        }
        stored.status = OrderStatusType::Processed;
        stored.accrual = Some(amount);
        stored.reconciled = true;
        stored.updated_at = Utc::now();
        let balance = state.balances.entry(order.user_id).or_insert_with(|| Balance::empty(order.user_id));
        balance.current += amount;
        let current = balance.current;
        state.credits.push((order.number.clone(), amount));
        Ok(CreditResult::Credited(current))
    }

    async fn persist_order(&self, order: &Order) -> Result<(), Self::Error> {
        let mut state = self.state();
        if State::take_failure(&mut state.fail_persists) {
            return Err(MemoryStoreError::Injected("persist_order"));
        }
        let Some(stored) = state.find_mut(&order.number, order.user_id) else {
            return Err(MemoryStoreError::OrderNotFound(order.number.clone()));
        };
        stored.status = order.status;
        if !stored.reconciled {
            stored.accrual = order.accrual;
        }
        stored.reconciled |= order.reconciled;
        stored.updated_at = Utc::now();
        state.persist_count += 1;
        Ok(())
    }
}

impl OrderManagement for MemoryStore {
    type Error = MemoryStoreError;

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut state = self.state();
        if let Some(existing) = state.orders.iter().find(|o| o.number == order.number) {
            return Ok(if existing.user_id == order.user_id {
                InsertOrderResult::AlreadyExists(existing.number.clone())
            } else {
                InsertOrderResult::OwnedByAnotherUser(existing.user_id)
            });
        }
        let now = Utc::now();
        state.orders.push(Order {
            number: order.number.clone(),
            user_id: order.user_id,
            status: OrderStatusType::New,
            accrual: None,
            reconciled: false,
            uploaded_at: now,
            updated_at: now,
        });
        Ok(InsertOrderResult::Inserted(order.number))
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error> {
        Ok(self.order(number))
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, Self::Error> {
        Ok(self.state().orders.iter().filter(|o| o.user_id == user_id).rev().cloned().collect())
    }

    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, Self::Error> {
        Ok(self.balance(user_id))
    }
}
