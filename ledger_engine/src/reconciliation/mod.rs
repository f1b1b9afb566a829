//! # The reconciliation engine
//!
//! Keeps local orders in step with the accrual service:
//!
//! * The [`Dispatcher`] polls the [`crate::OrderStore`] for unreconciled orders on a fixed interval and pushes them
//!   into a bounded job queue. An order that is already queued or being worked on is not queued again.
//! * A pool of workers takes orders off the queue and runs [`ReconciliationApi::reconcile`] on each one.
//! * When the accrual service rate limits a request, the worker suspends the dispatcher and the workers at once and
//!   reports it to the [`BackpressureController`], which lifts the suspension after a cooldown.
//!
//! [`ReconciliationEngine`] wires these together and hands back an [`EngineHandle`] for monitoring and shutdown.
mod accrual_service;
mod backpressure;
mod config;
mod dispatcher;
mod engine;
mod procedure;
mod queue;
mod stats;
mod worker_pool;

pub use accrual_service::AccrualService;
pub use backpressure::{BackpressureController, EngineState, RateLimitReporter, RateLimitSignal, SuspendFlag};
pub use config::{
    CursorPolicy,
    EngineConfig,
    DEFAULT_PAGE_SIZE,
    DEFAULT_POLL_INTERVAL,
    DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RATE_LIMIT_COOLDOWN,
    DEFAULT_WORKERS,
};
pub use dispatcher::{DispatchError, Dispatcher, PollSummary};
pub use engine::{EngineHandle, EngineMonitor, ReconciliationEngine};
pub use procedure::{ReconcileError, ReconcileOutcome, ReconciliationApi};
pub use queue::{job_queue, InFlight, JobReceiver, JobSender, QueueClosed, QueuedOrder};
pub use stats::{EngineStats, EngineStatus};
pub use worker_pool::{WorkerContext, WorkerPool};
