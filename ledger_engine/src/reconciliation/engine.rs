use std::sync::Arc;

use log::*;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    db::traits::OrderStore,
    events::EventProducers,
    reconciliation::{
        job_queue,
        AccrualService,
        BackpressureController,
        Dispatcher,
        EngineConfig,
        EngineState,
        EngineStats,
        EngineStatus,
        InFlight,
        ReconciliationApi,
        SuspendFlag,
        WorkerContext,
        WorkerPool,
    },
};

/// Builder for a running engine. Call [`ReconciliationEngine::start`] once per process.
pub struct ReconciliationEngine<S, A> {
    store: S,
    accrual: A,
    config: EngineConfig,
    producers: EventProducers,
}

impl<S, A> ReconciliationEngine<S, A>
where
    S: OrderStore,
    A: AccrualService,
{
    pub fn new(store: S, accrual: A, config: EngineConfig) -> Self {
        Self { store, accrual, config, producers: EventProducers::default() }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    /// Spawns the backpressure controller, the workers and the dispatcher, in that order. Must be called from within a
    /// tokio runtime.
    pub fn start(self) -> EngineHandle {
        let config = self.config.validated();
        info!(
            "🔁️ Starting reconciliation engine: {} workers, queue capacity {}, page size {}, cooldown {}s",
            config.workers,
            config.queue_capacity,
            config.page_size,
            config.rate_limit_cooldown.as_secs_f64()
        );
        let suspend = SuspendFlag::default();
        let stats = Arc::new(EngineStats::default());

        let controller = BackpressureController::new(config.rate_limit_cooldown, suspend.clone())
            .with_producers(self.producers.clone());
        let reporter = controller.reporter();
        let backpressure = tokio::spawn(controller.run());

        // The dispatcher must hold the only sender, so that dropping it closes the queue
        let (jobs, receiver) = job_queue(config.queue_capacity);
        let in_flight = jobs.in_flight();
        let api = Arc::new(ReconciliationApi::new(self.store.clone(), self.accrual, self.producers));
        let context = WorkerContext { jobs: receiver, api, suspend: suspend.clone(), reporter, stats: stats.clone() };
        let workers = WorkerPool::spawn(config.workers, context);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let dispatcher =
            Dispatcher::new(self.store, jobs, suspend.clone(), stats.clone(), config.page_size, config.cursor_policy);
        let dispatcher = tokio::spawn(dispatcher.run(config.poll_interval, shutdown_rx));

        let monitor = EngineMonitor { suspend, stats, in_flight };
        EngineHandle { monitor, shutdown, dispatcher, workers, backpressure }
    }
}

/// A cheap, cloneable read-only view of a running engine.
#[derive(Debug, Clone)]
pub struct EngineMonitor {
    suspend: SuspendFlag,
    stats: Arc<EngineStats>,
    in_flight: InFlight,
}

impl EngineMonitor {
    pub fn state(&self) -> EngineState {
        self.suspend.state()
    }

    pub fn status(&self) -> EngineStatus {
        self.stats.snapshot(self.suspend.state(), self.in_flight.len())
    }
}

pub struct EngineHandle {
    monitor: EngineMonitor,
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
    workers: WorkerPool,
    backpressure: JoinHandle<()>,
}

impl EngineHandle {
    pub fn monitor(&self) -> EngineMonitor {
        self.monitor.clone()
    }

    pub fn state(&self) -> EngineState {
        self.monitor.state()
    }

    pub fn status(&self) -> EngineStatus {
        self.monitor.status()
    }

    /// Stops the engine gracefully.
    ///
    /// The dispatcher stops polling and closes the job queue. Workers finish whatever is already queued (dropping it
    /// instead if reconciliation is suspended) and exit. Finally the backpressure controller is stopped, cutting any
    /// pending cooldown short.
    pub async fn shutdown(self) {
        info!("🔁️ Shutting down the reconciliation engine");
        // Fails only if the dispatcher has already gone, which is what we want anyway
        let _ = self.shutdown.send(true);
        if let Err(e) = self.dispatcher.await {
            error!("🔁️ The dispatcher stopped abnormally: {e}");
        }
        self.workers.join().await;
        self.backpressure.abort();
        match self.backpressure.await {
            Ok(()) => {},
            Err(e) if e.is_cancelled() => {},
            Err(e) => error!("🚦️ The backpressure controller stopped abnormally: {e}"),
        }
        info!("🔁️ Reconciliation engine stopped. Final status: {:?}", self.monitor.status());
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use ledger_common::Points;
    use tokio::time::{sleep, Instant};

    use super::*;
    use crate::{
        db::traits::OrderManagement,
        db_types::{NewOrder, OrderNumber, OrderStatusType},
        reconciliation::CursorPolicy,
        test_utils::{MemoryStore, ScriptedAccrual},
    };

    fn config() -> EngineConfig {
        EngineConfig::default().with_workers(4).with_queue_capacity(8).with_page_size(10)
    }

    #[tokio::test(start_paused = true)]
    async fn new_orders_are_credited() {
        let _ = env_logger::try_init();
        let store = MemoryStore::default();
        store.insert_order(NewOrder::new("A", 1)).await.unwrap();
        let accrual = ScriptedAccrual::default();
        accrual.processed("A", Points::from(1550));

        let engine = ReconciliationEngine::new(store.clone(), accrual.clone(), config()).start();
        sleep(Duration::from_secs(3)).await;

        let order = store.order(&"A".into()).unwrap();
        assert_eq!(order.status, OrderStatusType::Processed);
        assert!(order.reconciled);
        assert_eq!(store.balance(1).current, Points::from(1550));
        // Reconciled orders drop out of the poll, so the accrual service is asked exactly once
        assert_eq!(accrual.calls_for("A"), 1);
        let status = engine.status();
        assert_eq!(status.credited, 1);
        assert_eq!(status.state, EngineState::Running);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_reaches_the_accrual_service_during_a_cooldown() {
        let _ = env_logger::try_init();
        let store = MemoryStore::default();
        store.insert_order(NewOrder::new("B", 1)).await.unwrap();
        let accrual = ScriptedAccrual::default();
        accrual.rate_limit("B", None).processed("B", Points::from(700));
        accrual.processed("D", Points::from(300));

        let start = Instant::now();
        let engine = ReconciliationEngine::new(store.clone(), accrual.clone(), config()).start();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.state(), EngineState::Suspended);
        assert!(!store.order(&"B".into()).unwrap().reconciled);
        // New work arriving mid-cooldown waits too
        store.insert_order(NewOrder::new("D", 2)).await.unwrap();

        sleep(Duration::from_secs(50)).await;
        assert_eq!(engine.state(), EngineState::Suspended);
        assert_eq!(accrual.calls(), vec![OrderNumber::from("B")]);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.state(), EngineState::Running);
        assert!(store.order(&"B".into()).unwrap().reconciled);
        assert!(store.order(&"D".into()).unwrap().reconciled);
        assert_eq!(store.balance(1).current, Points::from(700));
        assert_eq!(store.balance(2).current, Points::from(300));

        let calls = accrual.calls_with_time();
        let first = calls[0].1;
        assert!(first - start < Duration::from_secs(1));
        assert!(calls[1..].iter().all(|(_, t)| *t - first >= Duration::from_secs(60)));
        assert_eq!(engine.status().rate_limited, 1);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn a_rate_limit_holds_back_the_rest_of_the_queue() {
        let _ = env_logger::try_init();
        let store = MemoryStore::default();
        for number in ["B", "C", "D", "E", "F"] {
            store.insert_order(NewOrder::new(number, 1)).await.unwrap();
        }
        let accrual = ScriptedAccrual::default();
        accrual.rate_limit("B", None).processed("B", Points::from(100));
        for number in ["C", "D", "E", "F"] {
            accrual.processed(number, Points::from(100));
        }

        // A single worker takes the queued orders one after the other, straight after the 429 for B
        let config = config().with_workers(1);
        let engine = ReconciliationEngine::new(store.clone(), accrual.clone(), config).start();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(engine.state(), EngineState::Suspended);
        assert_eq!(accrual.calls(), vec![OrderNumber::from("B")]);
        assert_eq!(store.balance(1).current, Points::default());

        sleep(Duration::from_secs(35)).await;
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(store.balance(1).current, Points::from(500));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn every_order_is_credited_exactly_once_under_load() {
        let _ = env_logger::try_init();
        let store = MemoryStore::default();
        let accrual = ScriptedAccrual::default().with_latency(Duration::from_millis(1500));
        for i in 0..40 {
            let number = format!("{}", 5000 + i);
            store.insert_order(NewOrder::new(number.as_str(), i % 4)).await.unwrap();
            accrual.processed(&number, Points::from(100));
        }

        // Polls come faster than the accrual service answers, so the same orders are seen many times
        let config = config().with_poll_interval(Duration::from_millis(200));
        let engine = ReconciliationEngine::new(store.clone(), accrual.clone(), config).start();
        sleep(Duration::from_secs(60)).await;

        let credits = store.credits();
        assert_eq!(credits.len(), 40);
        let unique = credits.iter().map(|(n, _)| n.clone()).collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), 40);
        for user in 0..4 {
            assert_eq!(store.balance(user).current, Points::from(1000));
        }
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pending_orders_do_not_starve_the_rest_of_the_set() {
        let store = MemoryStore::default();
        let accrual = ScriptedAccrual::default();
        for i in 0..25 {
            let number = format!("{}", 7000 + i);
            store.insert_order(NewOrder::new(number.as_str(), 1)).await.unwrap();
            accrual.status(&number, OrderStatusType::Processing);
        }
        let config = config().with_cursor_policy(CursorPolicy::Advance);
        let engine = ReconciliationEngine::new(store.clone(), accrual.clone(), config).start();
        sleep(Duration::from_secs(5)).await;

        for i in 0..25 {
            let order = store.order(&format!("{}", 7000 + i).into()).unwrap();
            assert_eq!(order.status, OrderStatusType::Processing);
        }
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_finishes_work_in_progress() {
        let store = MemoryStore::default();
        store.insert_order(NewOrder::new("S", 1)).await.unwrap();
        let accrual = ScriptedAccrual::default().with_latency(Duration::from_secs(5));
        accrual.processed("S", Points::from(100));

        let engine = ReconciliationEngine::new(store.clone(), accrual.clone(), config()).start();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.status().in_flight, 1);
        engine.shutdown().await;

        assert!(store.order(&"S".into()).unwrap().reconciled);
        assert_eq!(store.balance(1).current, Points::from(100));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_does_not_wait_for_a_cooldown() {
        let store = MemoryStore::default();
        store.insert_order(NewOrder::new("B", 1)).await.unwrap();
        let accrual = ScriptedAccrual::default();
        accrual.rate_limit("B", None);

        let engine = ReconciliationEngine::new(store, accrual, config()).start();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.state(), EngineState::Suspended);
        let start = Instant::now();
        engine.shutdown().await;
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
