//! PostgreSQL user repository implementation

use async_trait::async_trait;
use sqlx::PgPool;

use quotasync_types::{ExternalAccountId, ExternalBinding, User, UserId};

use crate::error::DbResult;
use crate::models::UserRow;
use crate::repo::{CreateUser, UserRepository};

const USER_COLUMNS: &str = "id, username, email, external_bound, external_id, external_username, \
                            remind_enabled, remind_days, created_at";

/// PostgreSQL user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalAccountId,
    ) -> DbResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_bound AND external_id = $1"
        ))
        .bind(external_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn create(&self, user: CreateUser) -> DbResult<User> {
        let (bound, external_id, external_username) = match &user.binding {
            Some(b) => (true, Some(b.external_id.0), Some(b.external_username.clone())),
            None => (false, None, None),
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, username, email, external_bound, external_id, external_username)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(bound)
        .bind(external_id)
        .bind(external_username)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn set_binding(&self, id: UserId, binding: &ExternalBinding) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET external_bound = TRUE, external_id = $1, external_username = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(binding.external_id.0)
        .bind(&binding.external_username)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
