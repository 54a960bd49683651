//! PostgreSQL order repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use quotasync_types::{Order, OrderId};

use crate::error::DbResult;
use crate::models::OrderRow;
use crate::repo::OrderRepository;

const ORDER_COLUMNS: &str = "id, order_no, user_id, plan_id, kind, period_days, amount_cents, \
                             payment_method, trade_no, status, paid_at, created_at";

/// PostgreSQL order repository
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_order_no(&self, order_no: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = $1"
        ))
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        trade_no: &str,
        paid_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'paid', trade_no = $1, paid_at = $2, updated_at = NOW()
            WHERE id = $3 AND status = 'pending'
            "#,
        )
        .bind(trade_no)
        .bind(paid_at)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() == 1;
        if !applied {
            debug!(order_id = %id, "order no longer pending, not marked paid");
        }
        Ok(applied)
    }
}
