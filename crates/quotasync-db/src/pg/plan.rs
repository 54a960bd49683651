//! PostgreSQL plan repository implementation

use async_trait::async_trait;
use sqlx::PgPool;

use quotasync_types::{Plan, PlanId};

use crate::error::DbResult;
use crate::models::PlanRow;
use crate::repo::PlanRepository;

/// PostgreSQL plan repository
#[derive(Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    /// Create a new plan repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn find_by_id(&self, id: PlanId) -> DbResult<Option<Plan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, name, description, period_kind, period_days, daily_quota, carry_over,
                   max_carry_over, price_model, price_cents, external_group, active,
                   sort_order, created_at
            FROM plans
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Plan::try_from).transpose()
    }
}
