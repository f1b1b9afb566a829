//! Server configuration, read from `LPG_*` environment variables.
//!
//! Every setting has a default. A value that is set but cannot be parsed is reported in the log and replaced by the
//! default, so a typo never stops the server from starting.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use accrual_tools::AccrualConfig;
use ledger_common::helpers::parse_boolean_flag;
use ledger_engine::{
    reconciliation::{
        DEFAULT_PAGE_SIZE,
        DEFAULT_POLL_INTERVAL,
        DEFAULT_QUEUE_CAPACITY,
        DEFAULT_RATE_LIMIT_COOLDOWN,
        DEFAULT_WORKERS,
    },
    CursorPolicy,
    EngineConfig,
};
use log::*;

const DEFAULT_LPG_HOST: &str = "127.0.0.1";
const DEFAULT_LPG_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/ledger.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, pending database migrations are applied before the engine starts.
    pub run_migrations: bool,
    pub accrual: AccrualConfig,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LPG_HOST.into(),
            port: DEFAULT_LPG_PORT,
            database_url: DEFAULT_DATABASE_URL.into(),
            run_migrations: true,
            accrual: AccrualConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("LPG_HOST").ok().unwrap_or_else(|| DEFAULT_LPG_HOST.into());
        let port = env_or_default("LPG_PORT", DEFAULT_LPG_PORT);
        let database_url = env::var("LPG_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ LPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.into()
        });
        let run_migrations = parse_boolean_flag(env::var("LPG_RUN_MIGRATIONS").ok(), true);
        let accrual = AccrualConfig::new_from_env_or_default();
        let engine = engine_config_from_env();
        Self { host, port, database_url, run_migrations, accrual, engine }
    }
}

/// Reads the reconciliation engine settings. Zero or negative numbers are caught later, by
/// [`EngineConfig::validated`].
pub fn engine_config_from_env() -> EngineConfig {
    let poll_ms = env_or_default("LPG_POLL_INTERVAL_MS", duration_millis(DEFAULT_POLL_INTERVAL));
    let workers = env_or_default("LPG_WORKERS", DEFAULT_WORKERS);
    let queue_capacity = env_or_default("LPG_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY);
    let page_size = env_or_default("LPG_PAGE_SIZE", DEFAULT_PAGE_SIZE);
    let cooldown = env_or_default("LPG_RATE_LIMIT_COOLDOWN", DEFAULT_RATE_LIMIT_COOLDOWN.as_secs());
    let cursor_policy = env_or_default("LPG_CURSOR_POLICY", CursorPolicy::default());
    EngineConfig::default()
        .with_poll_interval(Duration::from_millis(poll_ms))
        .with_workers(workers)
        .with_queue_capacity(queue_capacity)
        .with_page_size(page_size)
        .with_rate_limit_cooldown(Duration::from_secs(cooldown))
        .with_cursor_policy(cursor_policy)
}

fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or_default(name, env::var(name).ok(), default)
}

fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e} Using the default, {default}, instead.");
            default
        }),
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
