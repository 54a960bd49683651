//! External quota service abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use quotasync_types::ExternalAccountId;

use crate::error::GatewayResult;
use crate::models::{ExternalAccount, UsageEvent};

/// Remote quota service
///
/// Every call is a single remote round-trip bounded by the client timeout.
/// Implementations never retry; callers own the retry policy.
#[async_trait]
pub trait QuotaGateway: Send + Sync {
    /// Ensure a valid administrator session exists
    async fn authenticate_admin(&self) -> GatewayResult<()>;

    /// Verify end-user credentials and return the matching account
    async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> GatewayResult<ExternalAccount>;

    /// Current quota and group of an account
    async fn fetch_account(&self, id: ExternalAccountId) -> GatewayResult<ExternalAccount>;

    /// Overwrite quota and group of an account
    async fn update_account(
        &self,
        id: ExternalAccountId,
        quota: i64,
        group: &str,
    ) -> GatewayResult<()>;

    /// Provision a new account, returning its id
    async fn create_account(
        &self,
        username: &str,
        password: &str,
        group: &str,
    ) -> GatewayResult<ExternalAccountId>;

    /// Usage events of an account within `[from, to)`
    async fn fetch_usage(
        &self,
        id: ExternalAccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<UsageEvent>>;

    /// Group names known to the remote
    async fn list_groups(&self) -> GatewayResult<Vec<String>>;
}
