use std::sync::Arc;

use log::*;
use tokio::task::JoinHandle;

use crate::{
    db::traits::OrderStore,
    reconciliation::{
        queue::JobReceiver,
        AccrualService,
        EngineStats,
        RateLimitReporter,
        RateLimitSignal,
        ReconcileError,
        ReconcileOutcome,
        ReconciliationApi,
        SuspendFlag,
    },
};

/// Everything a worker needs. Each worker gets its own clone.
pub struct WorkerContext<S, A> {
    pub jobs: JobReceiver,
    pub api: Arc<ReconciliationApi<S, A>>,
    pub suspend: SuspendFlag,
    pub reporter: RateLimitReporter,
    pub stats: Arc<EngineStats>,
}

impl<S, A> Clone for WorkerContext<S, A> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            api: Arc::clone(&self.api),
            suspend: self.suspend.clone(),
            reporter: self.reporter.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// A fixed number of workers pulling from one job queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn<S, A>(size: usize, context: WorkerContext<S, A>) -> Self
    where
        S: OrderStore,
        A: AccrualService,
    {
        let handles = (0..size.max(1)).map(|id| tokio::spawn(run_worker(id, context.clone()))).collect();
        info!("👷️ Started {} reconciliation workers", size.max(1));
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to stop. Workers stop once the job queue is closed and empty.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("👷️ A worker stopped abnormally: {e}");
            }
        }
        debug!("👷️ All workers have stopped");
    }
}

async fn run_worker<S, A>(id: usize, context: WorkerContext<S, A>)
where
    S: OrderStore,
    A: AccrualService,
{
    trace!("👷️ Worker #{id} started");
    while let Some(job) = context.jobs.dequeue().await {
        let order = &job.order;
        if context.suspend.is_suspended() {
            // Still unreconciled in the store, so the dispatcher will find it again after the cooldown
            trace!("👷️ Worker #{id} dropped order {} because reconciliation is suspended", order.number);
            context.stats.record_skipped();
            continue;
        }
        match context.api.reconcile(order).await {
            Ok(ReconcileOutcome::Credited { .. }) => {
                context.stats.record_credited();
                context.stats.record_updated();
            },
            Ok(ReconcileOutcome::AlreadyCredited) | Ok(ReconcileOutcome::Updated) => context.stats.record_updated(),
            Ok(ReconcileOutcome::Unchanged) => {},
            Err(ReconcileError::RateLimited { retry_after }) => {
                warn!("👷️ Worker #{id}: the accrual service rate limited order {}", order.number);
                context.stats.record_rate_limited();
                context.reporter.report(RateLimitSignal { order: order.number.clone(), retry_after });
            },
            Err(e) => {
                error!("👷️ Worker #{id} could not reconcile order {}: {e}", order.number);
                context.stats.record_failed();
            },
        }
    }
    trace!("👷️ Worker #{id} stopped");
}
