//! Rate-limit backpressure.
//!
//! When the accrual service answers with a 429, the worker that saw it reports a [`RateLimitSignal`]. Reporting sets
//! the shared [`SuspendFlag`] before the worker takes its next job, so the very next order is already held back. The
//! [`BackpressureController`] then waits out the cooldown and clears the flag again. While the flag is set the
//! dispatcher does not poll and workers drop the orders they dequeue, so nothing is sent to the accrual service.
//!
//! Only one cooldown runs at a time. Signals that arrive during a cooldown are counted and folded into it.
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    db_types::OrderNumber,
    events::{BackpressureEvent, EventProducers},
};

// Only the signal that suspends the engine is sent, and the next one cannot be sent until the engine resumes
const SIGNAL_BUFFER_SIZE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Running,
    Suspended,
}

/// The shared RUNNING/SUSPENDED state. Cheap to clone; all clones see the same flag.
#[derive(Debug, Clone, Default)]
pub struct SuspendFlag(Arc<AtomicBool>);

impl SuspendFlag {
    pub fn is_suspended(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn state(&self) -> EngineState {
        if self.is_suspended() {
            EngineState::Suspended
        } else {
            EngineState::Running
        }
    }

    /// Returns `true` if this call moved the state from running to suspended.
    pub(crate) fn suspend(&self) -> bool {
        self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub(crate) fn resume(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub order: OrderNumber,
    /// The `Retry-After` hint from the accrual service, if it sent one.
    pub retry_after: Option<Duration>,
}

/// Suspends reconciliation as soon as a rate limit is seen, and hands the signal to the controller to time the cooldown.
/// Never waits.
#[derive(Debug, Clone)]
pub struct RateLimitReporter {
    suspend: SuspendFlag,
    coalesced: Arc<AtomicUsize>,
    sender: mpsc::Sender<RateLimitSignal>,
}

impl RateLimitReporter {
    pub fn report(&self, signal: RateLimitSignal) {
        if !self.suspend.suspend() {
            trace!("🚦️ Already suspended. Rate limit on order {} folded into the pending cooldown", signal.order);
            self.coalesced.fetch_add(1, Ordering::AcqRel);
            return;
        }
        match self.sender.try_send(signal) {
            Ok(()) => {},
            Err(TrySendError::Full(signal)) => {
                // Unreachable while the controller is the only one that clears the flag
                warn!("🚦️ A cooldown is already pending. Rate limit on order {} folded into it", signal.order);
                self.coalesced.fetch_add(1, Ordering::AcqRel);
            },
            Err(TrySendError::Closed(signal)) => {
                warn!("🚦️ The backpressure controller has stopped. Rate limit on order {} ignored", signal.order);
                self.suspend.resume();
            },
        }
    }
}

pub struct BackpressureController {
    suspend: SuspendFlag,
    cooldown: Duration,
    coalesced: Arc<AtomicUsize>,
    sender: mpsc::Sender<RateLimitSignal>,
    receiver: mpsc::Receiver<RateLimitSignal>,
    producers: EventProducers,
}

impl BackpressureController {
    pub fn new(cooldown: Duration, suspend: SuspendFlag) -> Self {
        let (sender, receiver) = mpsc::channel(SIGNAL_BUFFER_SIZE);
        let coalesced = Arc::new(AtomicUsize::new(0));
        Self { suspend, cooldown, coalesced, sender, receiver, producers: EventProducers::default() }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn reporter(&self) -> RateLimitReporter {
        RateLimitReporter {
            suspend: self.suspend.clone(),
            coalesced: self.coalesced.clone(),
            sender: self.sender.clone(),
        }
    }

    /// Times a cooldown for each signal that suspended the engine, until every reporter has been dropped.
    pub async fn run(self) {
        let Self { suspend, cooldown, coalesced, sender, mut receiver, producers } = self;
        // Only reporters may keep the channel open
        drop(sender);
        info!("🚦️ Backpressure controller started");
        while let Some(signal) = receiver.recv().await {
            let window = effective_cooldown(cooldown, &signal);
            warn!(
                "🚦️ The accrual service rate limited order {}. Reconciliation suspended for {}s",
                signal.order,
                window.as_secs_f64()
            );
            let event = BackpressureEvent::Suspended { trigger: signal.order, cooldown: window };
            producers.publish_backpressure(event).await;
            tokio::time::sleep(window).await;
            let folded = coalesced.swap(0, Ordering::AcqRel);
            suspend.resume();
            info!("🚦️ Cooldown over. Reconciliation resumed ({folded} further rate limits were folded into it)");
            producers.publish_backpressure(BackpressureEvent::Resumed { coalesced: folded }).await;
        }
        info!("🚦️ Backpressure controller stopped");
    }
}

/// The configured cooldown, stretched to honour a longer `Retry-After` hint.
fn effective_cooldown(configured: Duration, signal: &RateLimitSignal) -> Duration {
    signal.retry_after.map_or(configured, |hint| hint.max(configured))
}
