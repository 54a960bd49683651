//! Application state for the Subscribe API service.

use std::sync::Arc;

use quotasync_billing_core::{BindingService, Reconciler, SettlementService, UsageService};
use quotasync_db::DbPool;
use quotasync_gateway::QuotaGateway;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Order settlement
    pub settlement: SettlementService,
    /// Reconciliation passes and re-sync
    pub reconciler: Reconciler,
    /// Account binding
    pub binding: BindingService,
    /// Usage reporting
    pub usage: UsageService,
    /// Gateway client, for group listing
    pub gateway: Arc<dyn QuotaGateway>,
    /// Database pool (for readiness checks)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
