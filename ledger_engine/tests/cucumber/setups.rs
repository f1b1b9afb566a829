use cucumber::given;

use crate::cucumber::{LedgerSystem, LedgerWorld};

#[given("a fresh ledger")]
async fn fresh_ledger(world: &mut LedgerWorld) {
    world.system = Some(LedgerSystem::new().await);
}
