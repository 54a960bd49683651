//! Order settlement
//!
//! Turns a paid order into an active or extended subscription and provisions
//! the user's gateway account. Local state is authoritative: gateway failures
//! are logged, flagged for replay and never undo the settlement.
//!
//! The subscription is written before the order is flipped to `paid`, both
//! under the owner's lock, so a persistence failure leaves the order pending
//! and the payment callback can be retried. Subscriptions remember the last
//! order applied to them, which keeps a retry from applying it twice.

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use quotasync_db::{CreateSubscription, RecordSync};
use quotasync_types::{
    ExternalAccountId, ExternalBinding, Order, OrderKind, OrderStatus, Plan, SubscriptionId, User,
};

use crate::config::{EngineConfig, RenewFallback};
use crate::context::EngineContext;
use crate::error::{BillingError, BillingResult};
use crate::metrics::record_settlement;
use crate::period::extend_end_date;

/// Result of a settlement call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The order moved to `paid` during this call
    Settled {
        /// What happened to the user's subscription
        change: SubscriptionChange,
        /// Gateway account the quota was provisioned on, if any
        external_id: Option<ExternalAccountId>,
    },
    /// The order was already `paid`; nothing changed
    AlreadySettled,
}

/// Subscription effect of a settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// A fresh subscription was activated
    Created {
        subscription_id: SubscriptionId,
        end_date: NaiveDate,
    },
    /// The active subscription's end date moved.
    ///
    /// `previous_end` equals `end_date` when an earlier attempt already
    /// applied the order.
    Extended {
        subscription_id: SubscriptionId,
        previous_end: NaiveDate,
        end_date: NaiveDate,
    },
    /// Renewal without an active subscription was ignored
    Unchanged,
}

impl SubscriptionChange {
    /// Subscription touched by the settlement
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            Self::Created {
                subscription_id, ..
            }
            | Self::Extended {
                subscription_id, ..
            } => Some(*subscription_id),
            Self::Unchanged => None,
        }
    }
}

/// Settles paid orders
#[derive(Debug, Clone)]
pub struct SettlementService {
    ctx: EngineContext,
    config: EngineConfig,
}

impl SettlementService {
    /// Create a new settlement service
    pub fn new(ctx: EngineContext, config: EngineConfig) -> Self {
        Self { ctx, config }
    }

    /// Settle the order `order_no` with the payment provider's trade reference.
    ///
    /// Persistence failures are returned so the payment callback can be
    /// retried. Settling an order that is already paid is a no-op.
    #[instrument(skip(self))]
    pub async fn settle(&self, order_no: &str, trade_no: &str) -> BillingResult<SettlementOutcome> {
        let result = self.settle_inner(order_no, trade_no).await;

        match &result {
            Ok(SettlementOutcome::Settled { .. }) => record_settlement("settled"),
            Ok(SettlementOutcome::AlreadySettled) => record_settlement("already_settled"),
            Err(e) => {
                error!(error = %e, "settlement failed");
                record_settlement("error");
            }
        }

        result
    }

    /// Administrative settlement of a pending order
    #[instrument(skip(self))]
    pub async fn settle_manually(&self, order_no: &str) -> BillingResult<SettlementOutcome> {
        let order = self.find_order(order_no).await?;
        if order.status != OrderStatus::Pending {
            return Err(BillingError::InvalidOrderState {
                order_no: order.order_no,
                status: order.status,
            });
        }

        info!(order_no = %order_no, "manual settlement requested");
        self.settle(order_no, &order.manual_trade_no()).await
    }

    async fn find_order(&self, order_no: &str) -> BillingResult<Order> {
        self.ctx
            .orders
            .find_by_order_no(order_no)
            .await?
            .ok_or_else(|| BillingError::OrderNotFound(order_no.to_string()))
    }

    async fn settle_inner(&self, order_no: &str, trade_no: &str) -> BillingResult<SettlementOutcome> {
        let order = self.find_order(order_no).await?;
        if !Self::is_settleable(&order)? {
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let user = self
            .ctx
            .users
            .find_by_id(order.user_id)
            .await?
            .ok_or(BillingError::UserNotFound(order.user_id))?;
        let plan = self
            .ctx
            .plans
            .find_by_id(order.plan_id)
            .await?
            .ok_or(BillingError::PlanNotFound(order.plan_id))?;

        let today = self.ctx.clock.today();
        // Reject unusable periods before anything is written.
        extend_end_date(plan.period_kind, today, order.period_days)?;

        let _guard = self.ctx.locks.lock(user.id).await;

        // A concurrent callback may have finished while we waited.
        let order = self.find_order(order_no).await?;
        if !Self::is_settleable(&order)? {
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let binding = match user.binding.clone() {
            Some(binding) => Some(binding),
            None => self.provision_account(&user, &plan).await,
        };

        let change = match order.kind {
            OrderKind::New => self.activate(&user, &plan, &order, today).await?,
            OrderKind::Renew => self.renew(&user, &plan, &order, today).await?,
        };

        let paid_at = self.ctx.clock.now();
        if !self.ctx.orders.mark_paid(order.id, trade_no, paid_at).await? {
            warn!(order_no = %order_no, "order left pending state during settlement");
            return Ok(SettlementOutcome::AlreadySettled);
        }
        info!(order_no = %order_no, user_id = %user.id, trade_no = %trade_no, "order marked paid");

        if let Some(binding) = &binding {
            self.provision_quota(binding, &plan, &change, today).await;
        }

        info!(order_no = %order_no, user_id = %user.id, change = ?change, "order settled");

        Ok(SettlementOutcome::Settled {
            change,
            external_id: binding.map(|b| b.external_id),
        })
    }

    /// `Ok(false)` for an order that is already paid
    fn is_settleable(order: &Order) -> BillingResult<bool> {
        match order.status {
            OrderStatus::Pending => Ok(true),
            OrderStatus::Paid => {
                info!(order_no = %order.order_no, "order already settled");
                Ok(false)
            }
            OrderStatus::Cancelled | OrderStatus::Refunded => Err(BillingError::InvalidOrderState {
                order_no: order.order_no.clone(),
                status: order.status,
            }),
        }
    }

    /// Create a gateway account for an unbound user; failures leave the user unbound
    async fn provision_account(&self, user: &User, plan: &Plan) -> Option<ExternalBinding> {
        let external_id = match self
            .ctx
            .gateway
            .create_account(
                &user.username,
                &self.config.placeholder_password,
                &plan.external_group,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "failed to provision gateway account");
                return None;
            }
        };

        let binding = ExternalBinding {
            external_id,
            external_username: user.username.clone(),
        };

        match self.ctx.users.set_binding(user.id, &binding).await {
            Ok(()) => info!(user_id = %user.id, external_id = %external_id, "gateway account provisioned"),
            Err(e) => error!(
                error = %e,
                user_id = %user.id,
                external_id = %external_id,
                "gateway account provisioned but binding not stored"
            ),
        }

        Some(binding)
    }

    async fn activate(
        &self,
        user: &User,
        plan: &Plan,
        order: &Order,
        today: NaiveDate,
    ) -> BillingResult<SubscriptionChange> {
        if let Some(current) = self.ctx.subscriptions.find_active_by_user_id(user.id).await? {
            if current.last_order_id == Some(order.id) {
                info!(subscription_id = %current.id, order_no = %order.order_no, "order already activated");
                return Ok(SubscriptionChange::Created {
                    subscription_id: current.id,
                    end_date: current.end_date,
                });
            }
        }

        let superseded = self
            .ctx
            .subscriptions
            .expire_active_for_user(user.id)
            .await?;
        if superseded > 0 {
            info!(user_id = %user.id, superseded, "expired previous active subscription");
        }

        let end_date = extend_end_date(plan.period_kind, today, order.period_days)?;
        let subscription = self
            .ctx
            .subscriptions
            .create(CreateSubscription {
                id: SubscriptionId::new(),
                user_id: user.id,
                plan_id: plan.id,
                order_id: order.id,
                start_date: today,
                end_date,
                today_quota: plan.daily_quota,
                last_sync_date: Some(today),
                snapshot: plan.snapshot(),
            })
            .await?;

        info!(
            subscription_id = %subscription.id,
            user_id = %user.id,
            end_date = %end_date,
            "subscription activated"
        );

        Ok(SubscriptionChange::Created {
            subscription_id: subscription.id,
            end_date,
        })
    }

    async fn renew(
        &self,
        user: &User,
        plan: &Plan,
        order: &Order,
        today: NaiveDate,
    ) -> BillingResult<SubscriptionChange> {
        let Some(current) = self.ctx.subscriptions.find_active_by_user_id(user.id).await? else {
            return match self.config.renew_fallback {
                RenewFallback::Activate => {
                    info!(user_id = %user.id, "renewal without active subscription, activating");
                    self.activate(user, plan, order, today).await
                }
                RenewFallback::Ignore => {
                    warn!(
                        user_id = %user.id,
                        order_no = %order.order_no,
                        "renewal without active subscription ignored"
                    );
                    Ok(SubscriptionChange::Unchanged)
                }
            };
        };

        if current.last_order_id == Some(order.id) {
            info!(subscription_id = %current.id, order_no = %order.order_no, "order already applied");
            return Ok(SubscriptionChange::Extended {
                subscription_id: current.id,
                previous_end: current.end_date,
                end_date: current.end_date,
            });
        }

        let end_date = extend_end_date(plan.period_kind, current.end_date, order.period_days)?;
        if !self
            .ctx
            .subscriptions
            .extend_end_date(current.id, end_date, order.id)
            .await?
        {
            return Err(BillingError::SubscriptionNotFound(current.id));
        }

        info!(
            subscription_id = %current.id,
            previous_end = %current.end_date,
            end_date = %end_date,
            "subscription extended"
        );

        Ok(SubscriptionChange::Extended {
            subscription_id: current.id,
            previous_end: current.end_date,
            end_date,
        })
    }

    /// Push the plan's daily quota and group; failures are queued for the next pass.
    ///
    /// An extended subscription records the pushed quota first so a replay
    /// or re-sync sends the same value.
    async fn provision_quota(
        &self,
        binding: &ExternalBinding,
        plan: &Plan,
        change: &SubscriptionChange,
        today: NaiveDate,
    ) {
        let subscription_id = match change {
            SubscriptionChange::Created {
                subscription_id, ..
            } => *subscription_id,
            SubscriptionChange::Extended {
                subscription_id,
                end_date,
                ..
            } => {
                let recorded = self
                    .ctx
                    .subscriptions
                    .record_sync(
                        *subscription_id,
                        RecordSync {
                            today_quota: plan.daily_quota,
                            carried_quota: 0,
                            synced_on: today,
                            expected_end_date: *end_date,
                        },
                    )
                    .await;
                if let Err(e) = recorded {
                    error!(error = %e, subscription_id = %subscription_id, "failed to record renewal quota");
                }
                *subscription_id
            }
            SubscriptionChange::Unchanged => return,
        };

        let result = self
            .ctx
            .gateway
            .update_account(binding.external_id, plan.daily_quota, &plan.external_group)
            .await;

        if let Err(e) = result {
            warn!(
                error = %e,
                external_id = %binding.external_id,
                subscription_id = %subscription_id,
                "failed to provision quota, queued for next pass"
            );
            if let Err(e) = self
                .ctx
                .subscriptions
                .set_sync_pending(subscription_id, true)
                .await
            {
                error!(error = %e, subscription_id = %subscription_id, "failed to flag pending sync");
            }
        }
    }
}
