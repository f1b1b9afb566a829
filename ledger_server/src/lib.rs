//! # Loyalty ledger server
//! This crate hosts the long-running ledger process. It is responsible for:
//! * Connecting to the ledger database and bringing its schema up to date.
//! * Running the reconciliation engine, which keeps orders and balances in step with the accrual service.
//! * Serving a small operations API.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/status`: The reconciliation engine's state (running or suspended) and its counters, as JSON.
pub mod cli;
pub mod config;
pub mod errors;
pub mod reconciler;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
