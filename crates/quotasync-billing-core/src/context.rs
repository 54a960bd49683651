//! Shared collaborators of the engine services

use std::sync::Arc;

use quotasync_db::{
    OrderRepository, PlanRepository, Repositories, SubscriptionRepository, UserRepository,
};
use quotasync_gateway::QuotaGateway;

use crate::clock::Clock;
use crate::locks::UserLocks;

/// Stores, gateway, clock and lock table used by every engine service
#[derive(Clone)]
pub struct EngineContext {
    pub users: Arc<dyn UserRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub gateway: Arc<dyn QuotaGateway>,
    pub clock: Arc<dyn Clock>,
    pub locks: UserLocks,
}

impl EngineContext {
    /// Build a context from the PostgreSQL repositories
    pub fn new(repos: Repositories, gateway: Arc<dyn QuotaGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Arc::new(repos.users),
            plans: Arc::new(repos.plans),
            orders: Arc::new(repos.orders),
            subscriptions: Arc::new(repos.subscriptions),
            gateway,
            clock,
            locks: UserLocks::new(),
        }
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("locked_users", &self.locks.len())
            .finish_non_exhaustive()
    }
}
