//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use quotasync_types::{OrderId, Subscription, SubscriptionId, UserId};

use crate::error::DbResult;
use crate::models::SubscriptionRow;
use crate::repo::{CreateSubscription, RecordSync, SubscriptionRepository};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, status, start_date, end_date, \
                                    today_quota, carried_quota, last_sync_date, \
                                    last_reminder_date, sync_pending, last_order_id, \
                                    daily_quota, carry_over, max_carry_over, external_group, \
                                    created_at, updated_at";

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self, filter: &str) -> DbResult<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE {filter} ORDER BY end_date, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_active_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE user_id = $1 AND status = 'active'
            ORDER BY end_date DESC
            LIMIT 1
            "#
        ))
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn list_active(&self) -> DbResult<Vec<Subscription>> {
        self.fetch_all("status = 'active'").await
    }

    async fn list_sync_pending(&self) -> DbResult<Vec<Subscription>> {
        self.fetch_all("sync_pending").await
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, status, start_date, end_date, today_quota,
                carried_quota, last_sync_date, last_order_id, daily_quota, carry_over,
                max_carry_over, external_group
            )
            VALUES ($1, $2, $3, 'active', $4, $5, $6, 0, $7, $8, $9, $10, $11, $12)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(sub.id.0)
        .bind(sub.user_id.0)
        .bind(sub.plan_id.0)
        .bind(sub.start_date)
        .bind(sub.end_date)
        .bind(sub.today_quota)
        .bind(sub.last_sync_date)
        .bind(sub.order_id.0)
        .bind(sub.snapshot.daily_quota)
        .bind(sub.snapshot.carry_over)
        .bind(sub.snapshot.max_carry_over)
        .bind(&sub.snapshot.external_group)
        .fetch_one(&self.pool)
        .await?;

        debug!(subscription_id = %sub.id, user_id = %sub.user_id, "subscription row inserted");
        Subscription::try_from(row)
    }

    async fn expire_active_for_user(&self, user_id: UserId) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired', sync_pending = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND status = 'active'
            "#,
        )
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %user_id, rows = result.rows_affected(), "active subscriptions superseded");
        Ok(result.rows_affected())
    }

    async fn expire(&self, id: SubscriptionId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn extend_end_date(
        &self,
        id: SubscriptionId,
        end_date: NaiveDate,
        order_id: OrderId,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET end_date = $1, last_order_id = $2, updated_at = NOW()
            WHERE id = $3 AND status = 'active'
            "#,
        )
        .bind(end_date)
        .bind(order_id.0)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_sync(&self, id: SubscriptionId, update: RecordSync) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET today_quota = $1, carried_quota = $2, last_sync_date = $3,
                sync_pending = FALSE, updated_at = NOW()
            WHERE id = $4 AND status = 'active' AND end_date = $5
            "#,
        )
        .bind(update.today_quota)
        .bind(update.carried_quota)
        .bind(update.synced_on)
        .bind(id.0)
        .bind(update.expected_end_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_sync_pending(&self, id: SubscriptionId, pending: bool) -> DbResult<()> {
        sqlx::query("UPDATE subscriptions SET sync_pending = $1, updated_at = NOW() WHERE id = $2")
            .bind(pending)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_reminded(&self, id: SubscriptionId, on: NaiveDate) -> DbResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET last_reminder_date = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(on)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
