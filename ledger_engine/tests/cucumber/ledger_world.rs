use std::{fmt::Debug, time::Duration};

use cucumber::World;
use ledger_engine::{
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        ScriptedAccrual,
    },
    ReconcileError,
    ReconcileOutcome,
    ReconciliationApi,
    SqliteDatabase,
    SqliteDatabaseError,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct LedgerWorld {
    pub system: Option<LedgerSystem>,
}

pub struct LedgerSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub accrual: ScriptedAccrual,
    pub api: ReconciliationApi<SqliteDatabase, ScriptedAccrual>,
    pub cooldown: Duration,
    pub last_result: Option<Result<ReconcileOutcome, ReconcileError<SqliteDatabaseError>>>,
}

impl Debug for LedgerSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerSystem ({})", self.db_path)
    }
}

impl LedgerWorld {
    pub fn system(&mut self) -> &mut LedgerSystem {
        self.system.as_mut().expect("Ledger not initialised. Start the scenario with 'Given a fresh ledger'")
    }
}

impl LedgerSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("Created database: {db_path}");
        let accrual = ScriptedAccrual::default();
        let api = ReconciliationApi::new(db.clone(), accrual.clone(), EventProducers::default());
        Self { db_path, db, accrual, api, cooldown: Duration::ZERO, last_result: None }
    }
}
