//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use quotasync_types::{
    ExternalAccountId, ExternalBinding, Order, OrderId, Plan, PlanId, QuotaSnapshot, Subscription,
    SubscriptionId, User, UserId,
};

use crate::error::DbResult;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<User>>;

    /// Find the user bound to a gateway account
    async fn find_by_external_id(&self, external_id: ExternalAccountId)
        -> DbResult<Option<User>>;

    /// Create a new user
    async fn create(&self, user: CreateUser) -> DbResult<User>;

    /// Bind a user to a gateway account
    async fn set_binding(&self, id: UserId, binding: &ExternalBinding) -> DbResult<()>;
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub binding: Option<ExternalBinding>,
}

/// Plan repository trait
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Find a plan by ID
    async fn find_by_id(&self, id: PlanId) -> DbResult<Option<Plan>>;
}

/// Order repository trait
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Find an order by ID
    async fn find_by_id(&self, id: OrderId) -> DbResult<Option<Order>>;

    /// Find an order by its order number
    async fn find_by_order_no(&self, order_no: &str) -> DbResult<Option<Order>>;

    /// Move a pending order to `paid`.
    ///
    /// Returns `false` when the order was no longer pending, so concurrent
    /// callbacks cannot both settle it.
    async fn mark_paid(
        &self,
        id: OrderId,
        trade_no: &str,
        paid_at: DateTime<Utc>,
    ) -> DbResult<bool>;
}

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by ID
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>>;

    /// Find the active subscription for a user
    async fn find_active_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>>;

    /// All active subscriptions
    async fn list_active(&self) -> DbResult<Vec<Subscription>>;

    /// Subscriptions whose last gateway write failed
    async fn list_sync_pending(&self) -> DbResult<Vec<Subscription>>;

    /// Create a new subscription
    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription>;

    /// Expire every active subscription of a user, returning how many changed.
    ///
    /// Pending gateway writes of the superseded rows are dropped; the
    /// replacement subscription owns the account from then on.
    async fn expire_active_for_user(&self, user_id: UserId) -> DbResult<u64>;

    /// Expire one subscription if it is still active
    async fn expire(&self, id: SubscriptionId) -> DbResult<bool>;

    /// Move the end date of an active subscription and remember the order
    async fn extend_end_date(
        &self,
        id: SubscriptionId,
        end_date: NaiveDate,
        order_id: OrderId,
    ) -> DbResult<bool>;

    /// Store the outcome of a daily sync.
    ///
    /// Applies only while the row is still active and still ends on
    /// `update.expected_end_date`; returns whether it applied.
    async fn record_sync(&self, id: SubscriptionId, update: RecordSync) -> DbResult<bool>;

    /// Flag or clear a pending gateway write
    async fn set_sync_pending(&self, id: SubscriptionId, pending: bool) -> DbResult<()>;

    /// Remember the day a reminder was queued
    async fn mark_reminded(&self, id: SubscriptionId, on: NaiveDate) -> DbResult<()>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub order_id: OrderId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub today_quota: i64,
    pub last_sync_date: Option<NaiveDate>,
    pub snapshot: QuotaSnapshot,
}

/// Daily sync outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSync {
    pub today_quota: i64,
    pub carried_quota: i64,
    pub synced_on: NaiveDate,
    pub expected_end_date: NaiveDate,
}
