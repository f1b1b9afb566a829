//! # Accrual service client
//!
//! A thin client for the external accrual service. The service decides how many loyalty points an order earns; this
//! crate only asks it, one order at a time, and turns the HTTP response into an [`AccrualOrder`] or an
//! [`AccrualApiError`].
//!
//! There are no retries here. A [`AccrualApiError::RateLimited`] error is surfaced as-is so that callers can apply
//! their own backpressure policy.
mod api;
mod config;
mod data_objects;
mod error;

pub mod helpers;

pub use api::AccrualApi;
pub use config::AccrualConfig;
pub use data_objects::{AccrualOrder, AccrualStatus};
pub use error::AccrualApiError;
