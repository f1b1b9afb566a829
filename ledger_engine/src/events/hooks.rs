use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BackpressureEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderCreditedEvent,
    OrderModifiedEvent,
};

/// The publishing side of every registered hook. Cloned into each engine component that emits events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_credited_producer: Vec<EventProducer<OrderCreditedEvent>>,
    pub order_modified_producer: Vec<EventProducer<OrderModifiedEvent>>,
    pub backpressure_producer: Vec<EventProducer<BackpressureEvent>>,
}

impl EventProducers {
    pub async fn publish_order_credited(&self, event: OrderCreditedEvent) {
        for producer in &self.order_credited_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_modified(&self, event: OrderModifiedEvent) {
        for producer in &self.order_modified_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_backpressure(&self, event: BackpressureEvent) {
        for producer in &self.backpressure_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_credited: Option<EventHandler<OrderCreditedEvent>>,
    pub on_order_modified: Option<EventHandler<OrderModifiedEvent>>,
    pub on_backpressure: Option<EventHandler<BackpressureEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_credited = hooks.on_order_credited.map(|f| EventHandler::new(buffer_size, f));
        let on_order_modified = hooks.on_order_modified.map(|f| EventHandler::new(buffer_size, f));
        let on_backpressure = hooks.on_backpressure.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_credited, on_order_modified, on_backpressure }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_credited {
            result.order_credited_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_modified {
            result.order_modified_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_backpressure {
            result.backpressure_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for each registered handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_order_credited {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_modified {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_backpressure {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_credited: Option<Handler<OrderCreditedEvent>>,
    pub on_order_modified: Option<Handler<OrderModifiedEvent>>,
    pub on_backpressure: Option<Handler<BackpressureEvent>>,
}

impl EventHooks {
    pub fn on_order_credited<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreditedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_credited = Some(Arc::new(f));
        self
    }

    pub fn on_order_modified<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderModifiedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_modified = Some(Arc::new(f));
        self
    }

    pub fn on_backpressure<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BackpressureEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_backpressure = Some(Arc::new(f));
        self
    }
}
