use std::{fmt::Display, str::FromStr, time::Duration};

use log::warn;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Where each poll starts reading the unreconciled set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorPolicy {
    /// Every poll reads the first page. Reconciled orders drop out of the set, so the head moves as orders complete and
    /// no order is ever passed over. Orders the accrual service keeps pending stay at the head, and once a full page of
    /// them has built up nothing behind them is read until one of them resolves.
    #[default]
    Rescan,
    /// Each poll starts where the previous page ended and wraps back to the start after a short page. Orders that are
    /// reconciled between polls shift the set, so some orders can be passed over until the next wrap. Use this when a
    /// backlog of pending orders would otherwise hide the rest of the set.
    Advance,
}

impl Display for CursorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorPolicy::Rescan => write!(f, "rescan"),
            CursorPolicy::Advance => write!(f, "advance"),
        }
    }
}

impl FromStr for CursorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rescan" => Ok(Self::Rescan),
            "advance" => Ok(Self::Advance),
            s => Err(format!("Unknown cursor policy: {s}. Expected 'rescan' or 'advance'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often the dispatcher polls the store.
    pub poll_interval: Duration,
    /// Number of concurrent workers.
    pub workers: usize,
    /// Maximum number of orders waiting in the job queue. The dispatcher waits when the queue is full.
    pub queue_capacity: usize,
    /// Maximum number of orders fetched per poll.
    pub page_size: i64,
    /// Minimum time reconciliation stays suspended after the accrual service rate limits us.
    pub rate_limit_cooldown: Duration,
    pub cursor_policy: CursorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
            cursor_policy: CursorPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    pub fn with_cursor_policy(mut self, policy: CursorPolicy) -> Self {
        self.cursor_policy = policy;
        self
    }

    /// Replaces values the engine cannot run with by their defaults.
    pub fn validated(mut self) -> Self {
        if self.poll_interval.is_zero() {
            warn!("🪛️ A zero poll interval is not allowed. Using {}ms", DEFAULT_POLL_INTERVAL.as_millis());
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        if self.workers == 0 {
            warn!("🪛️ The engine needs at least one worker. Using {DEFAULT_WORKERS}");
            self.workers = DEFAULT_WORKERS;
        }
        if self.queue_capacity == 0 {
            warn!("🪛️ The job queue needs a capacity of at least one. Using {DEFAULT_QUEUE_CAPACITY}");
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.page_size <= 0 {
            warn!("🪛️ Invalid page size {}. Using {DEFAULT_PAGE_SIZE}", self.page_size);
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self
    }
}
