use std::{sync::Arc, time::Duration};

use log::*;
use thiserror::Error;
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};

use crate::{
    db::traits::OrderStore,
    reconciliation::{queue::JobSender, CursorPolicy, EngineStats, SuspendFlag},
};

#[derive(Debug, Error)]
pub enum DispatchError<E: std::error::Error> {
    #[error("Could not fetch unreconciled orders: {0}")]
    FetchFailed(E),
    #[error("The job queue has been closed")]
    QueueClosed,
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Orders taken from the page, whether queued or already in flight.
    pub taken: usize,
    pub queued: usize,
    pub already_in_flight: usize,
    /// True if the poll was skipped, or stopped early, because reconciliation is suspended.
    pub suspended: bool,
}

/// Polls the store on a fixed interval and feeds unreconciled orders into the job queue.
pub struct Dispatcher<S> {
    store: S,
    jobs: JobSender,
    suspend: SuspendFlag,
    stats: Arc<EngineStats>,
    page_size: i64,
    policy: CursorPolicy,
    cursor: i64,
}

impl<S> Dispatcher<S>
where S: OrderStore
{
    pub fn new(
        store: S,
        jobs: JobSender,
        suspend: SuspendFlag,
        stats: Arc<EngineStats>,
        page_size: i64,
        policy: CursorPolicy,
    ) -> Self {
        Self { store, jobs, suspend, stats, page_size, policy, cursor: 0 }
    }

    /// The offset the next poll will read from.
    pub fn cursor(&self) -> i64 {
        match self.policy {
            CursorPolicy::Rescan => 0,
            CursorPolicy::Advance => self.cursor,
        }
    }

    /// Runs one poll. Nothing is fetched while reconciliation is suspended. Queueing waits if the queue is full.
    pub async fn poll_once(&mut self) -> Result<PollSummary, DispatchError<S::Error>> {
        let mut summary = PollSummary::default();
        if self.suspend.is_suspended() {
            trace!("🔁️ Reconciliation is suspended. Skipping this poll.");
            summary.suspended = true;
            return Ok(summary);
        }
        let offset = self.cursor();
        let page = self.store.fetch_unreconciled(offset, self.page_size).await.map_err(DispatchError::FetchFailed)?;
        let page_len = page.len();
        for order in page {
            if self.suspend.is_suspended() {
                debug!("🔁️ Reconciliation was suspended part way through the page. Stopping here.");
                summary.suspended = true;
                break;
            }
            summary.taken += 1;
            match self.jobs.enqueue(order).await {
                Ok(true) => summary.queued += 1,
                Ok(false) => summary.already_in_flight += 1,
                Err(_) => return Err(DispatchError::QueueClosed),
            }
        }
        self.stats.record_dispatched(summary.queued as u64);
        if self.policy == CursorPolicy::Advance {
            self.cursor = if page_len < self.page_size as usize && !summary.suspended {
                0
            } else {
                offset + summary.taken as i64
            };
        }
        if summary.queued > 0 {
            debug!(
                "🔁️ Queued {} orders ({} already in flight) from offset {offset}",
                summary.queued, summary.already_in_flight
            );
        }
        Ok(summary)
    }

    /// Polls every `period` until `shutdown` fires or its sender is dropped. Fetch failures are logged and the loop
    /// carries on with the next tick. When this returns the dispatcher's end of the job queue is dropped, which lets
    /// the workers drain the queue and stop.
    pub async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("🔁️ Dispatcher started. Polling every {}ms with the {} cursor policy", period.as_millis(), self.policy);
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = timer.tick() => {},
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("🔁️ Shutdown requested during a poll. The rest of the page was not queued.");
                    break;
                },
                result = self.poll_once() => match result {
                    Ok(_) => {},
                    Err(DispatchError::FetchFailed(e)) => error!("🔁️ Could not fetch unreconciled orders: {e}"),
                    Err(DispatchError::QueueClosed) => {
                        warn!("🔁️ The job queue has been closed. The dispatcher is stopping.");
                        break;
                    },
                },
            }
        }
        info!("🔁️ Dispatcher stopped");
    }
}

#[cfg(test)]
mod test {
    use ledger_common::Points;

    use super::*;
    use crate::{
        db_types::OrderNumber,
        reconciliation::queue::{job_queue, JobReceiver},
        test_utils::{new_order, MemoryStore},
    };

    fn dispatcher(
        store: &MemoryStore,
        capacity: usize,
        page_size: i64,
        policy: CursorPolicy,
    ) -> (Dispatcher<MemoryStore>, JobReceiver, SuspendFlag) {
        let (sender, receiver) = job_queue(capacity);
        let flag = SuspendFlag::default();
        let stats = Arc::new(EngineStats::default());
        (Dispatcher::new(store.clone(), sender, flag.clone(), stats, page_size, policy), receiver, flag)
    }

    fn store_with_orders(count: usize) -> MemoryStore {
        let store = MemoryStore::default();
        for i in 0..count {
            store.add_order(new_order(&format!("{}", 1000 + i), 1));
        }
        store
    }

    async fn drain(receiver: &JobReceiver, count: usize) -> Vec<OrderNumber> {
        let mut result = Vec::with_capacity(count);
        for _ in 0..count {
            result.push(receiver.dequeue().await.unwrap().order.number);
        }
        result
    }

    #[tokio::test]
    async fn rescan_always_reads_the_head() {
        let store = store_with_orders(5);
        let (mut dispatcher, receiver, _) = dispatcher(&store, 10, 2, CursorPolicy::Rescan);

        let summary = dispatcher.poll_once().await.unwrap();
        assert_eq!(summary.queued, 2);
        assert_eq!(drain(&receiver, 2).await, vec!["1000".into(), "1001".into()]);
        dispatcher.poll_once().await.unwrap();
        assert_eq!(dispatcher.cursor(), 0);
        assert_eq!(store.fetch_offsets(), vec![0, 0]);
    }

    #[tokio::test]
    async fn rescan_does_not_queue_orders_that_are_still_in_flight() {
        let store = store_with_orders(3);
        let (mut dispatcher, receiver, _) = dispatcher(&store, 10, 10, CursorPolicy::Rescan);

        assert_eq!(dispatcher.poll_once().await.unwrap().queued, 3);
        let summary = dispatcher.poll_once().await.unwrap();
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.already_in_flight, 3);
        let jobs = drain(&receiver, 3).await;
        assert_eq!(jobs.len(), 3);
    }

    #[tokio::test]
    async fn advance_moves_through_the_set_and_wraps() {
        let store = store_with_orders(5);
        let (mut dispatcher, receiver, _) = dispatcher(&store, 10, 2, CursorPolicy::Advance);

        dispatcher.poll_once().await.unwrap();
        assert_eq!(dispatcher.cursor(), 2);
        dispatcher.poll_once().await.unwrap();
        assert_eq!(dispatcher.cursor(), 4);
        // Short page: wrap around
        dispatcher.poll_once().await.unwrap();
        assert_eq!(dispatcher.cursor(), 0);
        assert_eq!(store.fetch_offsets(), vec![0, 2, 4]);
        let jobs = drain(&receiver, 5).await;
        assert_eq!(jobs.len(), 5);
    }

    #[tokio::test]
    async fn nothing_is_fetched_while_suspended() {
        let store = store_with_orders(3);
        let (mut dispatcher, _receiver, flag) = dispatcher(&store, 10, 10, CursorPolicy::Rescan);
        flag.suspend();

        let summary = dispatcher.poll_once().await.unwrap();
        assert!(summary.suspended);
        assert_eq!(summary.queued, 0);
        assert!(store.fetch_offsets().is_empty());
    }

    #[tokio::test]
    async fn reconciled_orders_are_not_dispatched() {
        let store = store_with_orders(3);
        store.force_reconciled(&"1001".into(), Points::from(100));
        let (mut dispatcher, receiver, _) = dispatcher(&store, 10, 10, CursorPolicy::Rescan);

        assert_eq!(dispatcher.poll_once().await.unwrap().queued, 2);
        assert_eq!(drain(&receiver, 2).await, vec!["1000".into(), "1002".into()]);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failures_do_not_stop_the_schedule() {
        let _ = env_logger::try_init();
        let store = store_with_orders(1);
        store.fail_next_fetches(2);
        let (dispatcher, receiver, _) = dispatcher(&store, 10, 10, CursorPolicy::Rescan);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(dispatcher.run(Duration::from_secs(1), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let job = receiver.dequeue().await.unwrap();
        assert_eq!(job.order.number, "1000".into());
        assert_eq!(store.fetch_offsets().len(), 3);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        drop(job);
        // The dispatcher has gone, so the queue is closed
        assert!(receiver.dequeue().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn a_full_queue_holds_the_dispatcher_back() {
        let store = store_with_orders(5);
        let (mut dispatcher, receiver, _) = dispatcher(&store, 2, 10, CursorPolicy::Rescan);

        let poll = tokio::time::timeout(Duration::from_secs(10), dispatcher.poll_once()).await;
        assert!(poll.is_err(), "the poll should wait for queue space");

        let consumer = tokio::spawn(async move { drain(&receiver, 5).await });
        let summary = dispatcher.poll_once().await.unwrap();
        assert_eq!(summary.queued + summary.already_in_flight, 5);
        assert_eq!(consumer.await.unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cuts_a_blocked_poll_short() {
        let _ = env_logger::try_init();
        let store = store_with_orders(5);
        let (dispatcher, receiver, _) = dispatcher(&store, 2, 10, CursorPolicy::Rescan);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(dispatcher.run(Duration::from_secs(1), shutdown_rx));

        // Nobody is consuming, so the first poll is stuck waiting for queue space
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!task.is_finished());
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task).await.expect("dispatcher did not stop").unwrap();

        // Only what fitted in the queue was dispatched, and the queue is now closed
        assert_eq!(drain(&receiver, 2).await, vec!["1000".into(), "1001".into()]);
        assert!(receiver.dequeue().await.is_none());
    }
}
