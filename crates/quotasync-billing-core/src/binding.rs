//! Gateway account binding

use tracing::{info, instrument, warn};

use quotasync_db::CreateUser;
use quotasync_types::{ExternalBinding, User, UserId};

use crate::context::EngineContext;
use crate::error::{BillingError, BillingResult};

/// Links local users to gateway accounts
#[derive(Debug, Clone)]
pub struct BindingService {
    ctx: EngineContext,
}

impl BindingService {
    /// Create a new binding service
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Bind `user_id` to an existing gateway account after verifying its credentials.
    ///
    /// When the user already holds an active subscription its quota is pushed
    /// to the new account; a failed push is queued for the next pass.
    #[instrument(skip(self, password))]
    pub async fn bind_existing(
        &self,
        user_id: UserId,
        username: &str,
        password: &str,
    ) -> BillingResult<User> {
        let _guard = self.ctx.locks.lock(user_id).await;

        let user = self
            .ctx
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BillingError::UserNotFound(user_id))?;
        if user.is_bound() {
            return Err(BillingError::AlreadyBound);
        }

        let account = self.ctx.gateway.authenticate_user(username, password).await?;

        if let Some(owner) = self.ctx.users.find_by_external_id(account.id).await? {
            if owner.id != user_id {
                warn!(external_id = %account.id, owner = %owner.id, "gateway account already bound");
                return Err(BillingError::AccountTakenByOtherUser);
            }
        }

        let binding = ExternalBinding {
            external_id: account.id,
            external_username: account.username.clone(),
        };
        self.ctx.users.set_binding(user_id, &binding).await?;
        info!(user_id = %user_id, external_id = %account.id, "gateway account bound");

        if let Some(subscription) = self.ctx.subscriptions.find_active_by_user_id(user_id).await? {
            let pushed = self
                .ctx
                .gateway
                .update_account(
                    account.id,
                    subscription.today_quota,
                    &subscription.snapshot.external_group,
                )
                .await;
            if let Err(e) = pushed {
                warn!(error = %e, subscription_id = %subscription.id, "failed to push quota after binding");
                self.ctx
                    .subscriptions
                    .set_sync_pending(subscription.id, true)
                    .await?;
            }
        }

        Ok(User {
            binding: Some(binding),
            ..user
        })
    }

    /// Sign in with gateway credentials, creating a bound local user on first login
    #[instrument(skip(self, password))]
    pub async fn login_with_external(&self, username: &str, password: &str) -> BillingResult<User> {
        let account = self.ctx.gateway.authenticate_user(username, password).await?;

        if let Some(user) = self.ctx.users.find_by_external_id(account.id).await? {
            return Ok(user);
        }

        let email = Some(account.email.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        let user = self
            .ctx
            .users
            .create(CreateUser {
                id: UserId::new(),
                username: account.username.clone(),
                email,
                binding: Some(ExternalBinding {
                    external_id: account.id,
                    external_username: account.username,
                }),
            })
            .await?;

        info!(user_id = %user.id, external_id = %account.id, "local user created from gateway login");
        Ok(user)
    }
}
