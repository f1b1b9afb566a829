//! The bounded job queue between the dispatcher and the workers.
//!
//! Every queued order holds an [`InFlightClaim`] on its number. The claim is released when the job is dropped, which
//! happens once a worker has finished with it (or skipped it). While a claim is held the dispatcher will not queue the
//! same order again, so two workers never reconcile the same order at once.
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use log::trace;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::db_types::{Order, OrderNumber};

#[derive(Debug, Clone, Copy, Error)]
#[error("The job queue has been closed")]
pub struct QueueClosed;

/// The set of order numbers that are queued or being processed.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    numbers: Arc<Mutex<HashSet<OrderNumber>>>,
}

impl InFlight {
    /// Claims `number`, or returns `None` if it is already claimed.
    pub fn claim(&self, number: &OrderNumber) -> Option<InFlightClaim> {
        let mut numbers = self.numbers.lock().unwrap_or_else(PoisonError::into_inner);
        if numbers.insert(number.clone()) {
            Some(InFlightClaim { number: number.clone(), numbers: Arc::clone(&self.numbers) })
        } else {
            None
        }
    }

    pub fn contains(&self, number: &OrderNumber) -> bool {
        self.numbers.lock().unwrap_or_else(PoisonError::into_inner).contains(number)
    }

    pub fn len(&self) -> usize {
        self.numbers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct InFlightClaim {
    number: OrderNumber,
    numbers: Arc<Mutex<HashSet<OrderNumber>>>,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.numbers.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.number);
    }
}

/// An order waiting for, or held by, a worker.
#[derive(Debug)]
pub struct QueuedOrder {
    pub order: Order,
    _claim: InFlightClaim,
}

/// Creates a job queue that holds at most `capacity` orders.
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let sender = JobSender { sender, in_flight: InFlight::default() };
    let receiver = JobReceiver { receiver: Arc::new(AsyncMutex::new(receiver)) };
    (sender, receiver)
}

/// The dispatcher's end of the queue. When every sender is dropped the queue closes and workers stop once it is empty.
#[derive(Debug, Clone)]
pub struct JobSender {
    sender: mpsc::Sender<QueuedOrder>,
    in_flight: InFlight,
}

impl JobSender {
    /// Queues the order, waiting for space if the queue is full.
    ///
    /// Returns `Ok(false)` without queueing anything if the order is already in flight.
    pub async fn enqueue(&self, order: Order) -> Result<bool, QueueClosed> {
        let Some(claim) = self.in_flight.claim(&order.number) else {
            trace!("🔁️ Order {} is already in flight", order.number);
            return Ok(false);
        };
        self.sender.send(QueuedOrder { order, _claim: claim }).await.map_err(|_| QueueClosed)?;
        Ok(true)
    }

    /// The number of orders currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }
}

/// The workers' end of the queue. Clones share one underlying receiver, and each job goes to exactly one worker.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    receiver: Arc<AsyncMutex<mpsc::Receiver<QueuedOrder>>>,
}

impl JobReceiver {
    /// Waits for the next job. Returns `None` once the queue is closed and empty.
    pub async fn dequeue(&self) -> Option<QueuedOrder> {
        self.receiver.lock().await.recv().await
    }
}
