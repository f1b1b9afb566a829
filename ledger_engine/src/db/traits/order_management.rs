use crate::{
    db::traits::InsertOrderResult,
    db_types::{Balance, NewOrder, Order, OrderNumber},
};

/// Order intake and queries.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error;

    /// Stores a new order with status `NEW`. Inserting the same order for the same user twice is not an error; the
    /// second call returns [`InsertOrderResult::AlreadyExists`]. An order number belongs to whoever uploaded it first.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error>;

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error>;

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, Self::Error>;

    /// Returns the user's balance. Users that have never been credited have a zero balance.
    async fn fetch_balance(&self, user_id: i64) -> Result<Balance, Self::Error>;
}
