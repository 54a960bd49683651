//! Usage reporting from gateway logs

use chrono::{DateTime, Days, Utc};
use tracing::instrument;

use quotasync_gateway::UsageEvent;
use quotasync_types::{ExternalAccountId, UserId};

use crate::context::EngineContext;
use crate::error::{BillingError, BillingResult};

/// Reads a bound user's consumption from the gateway
#[derive(Debug, Clone)]
pub struct UsageService {
    ctx: EngineContext,
}

impl UsageService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Itemised usage events in `[from, to]`
    #[instrument(skip(self))]
    pub async fn usage_between(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BillingResult<Vec<UsageEvent>> {
        let external_id = self.external_id(user_id).await?;
        Ok(self.ctx.gateway.fetch_usage(external_id, from, to).await?)
    }

    /// Quota consumed since the start of today
    #[instrument(skip(self))]
    pub async fn used_today(&self, user_id: UserId) -> BillingResult<i64> {
        let today = self.ctx.clock.today();
        let from = self.ctx.clock.start_of_day(today);
        let to = today
            .checked_add_days(Days::new(1))
            .map(|tomorrow| self.ctx.clock.start_of_day(tomorrow))
            .unwrap_or_else(|| self.ctx.clock.now());

        let events = self.usage_between(user_id, from, to).await?;
        Ok(events
            .iter()
            .filter(|e| e.occurred_at().is_some_and(|at| at >= from && at < to))
            .map(|e| e.quota)
            .sum())
    }

    async fn external_id(&self, user_id: UserId) -> BillingResult<ExternalAccountId> {
        self.ctx
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BillingError::UserNotFound(user_id))?
            .external_id()
            .ok_or(BillingError::NotBound)
    }
}
