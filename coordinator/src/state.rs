use std::sync::Arc;

use sqlx::SqlitePool;

use crate::dispatch::gateway::GatewayClient;
use crate::ledger::LedgerSync;

/// Explicitly constructed shared state passed into every handler.
///
/// No module-level singletons: tests build one of these per case with a
/// scratch database, a recording gateway, and a temp ledger path.
pub struct AppState {
    pub db: SqlitePool,
    pub gateway: Arc<dyn GatewayClient>,
    pub ledger: LedgerSync,
}
