//! Simple stateless pub-sub event handler
//!
//! Components of the ledger (the server's logging, for example) can subscribe to engine events and react to them.
//! Handlers only ever see the event itself, never the engine's internal state. Handlers can be async, and each event is
//! handled on its own task so a slow handler does not hold up the engine.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Handles events until every producer has been dropped, then waits for the outstanding handlers to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only producers may keep the channel open
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            // Reap finished jobs so the set does not grow without bound on a long-running server
            while let Some(done) = jobs.try_join_next() {
                if let Err(e) = done {
                    warn!("📬️ An event handler failed: {e}");
                }
            }
        }
        debug!("📬️ All producers are gone. Waiting for {} outstanding handlers", jobs.len());
        while let Some(done) = jobs.join_next().await {
            if let Err(e) = done {
                warn!("📬️ An event handler failed: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
