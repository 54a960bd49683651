//! Expiry reminders

use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use quotasync_types::{Subscription, User};

use crate::context::EngineContext;
use crate::error::BillingResult;
use crate::notifier::{Reminder, ReminderDispatcher};

/// Days until expiry when `subscription` is due a reminder today.
///
/// Due when the owner wants reminders, has an address, the subscription is
/// within the owner's lead window (`0..=remind_days` days left) and no
/// reminder was queued for it today.
pub fn due_reminder(subscription: &Subscription, user: &User, today: NaiveDate) -> Option<i64> {
    if !subscription.is_active() || subscription.reminded_on(today) {
        return None;
    }
    user.reminder_address()?;

    let days = subscription.days_until_end(today);
    (0..=i64::from(user.remind_days)).contains(&days).then_some(days)
}

/// Decides which users get an expiry reminder
#[derive(Debug, Clone)]
pub struct ReminderEvaluator {
    ctx: EngineContext,
    dispatcher: ReminderDispatcher,
}

impl ReminderEvaluator {
    /// Create a new evaluator
    pub fn new(ctx: EngineContext, dispatcher: ReminderDispatcher) -> Self {
        Self { ctx, dispatcher }
    }

    /// Queue reminders for every due subscription, returning how many were queued
    #[instrument(skip(self))]
    pub async fn evaluate(&self, today: NaiveDate) -> BillingResult<usize> {
        let subscriptions = self.ctx.subscriptions.list_active().await?;
        let mut queued = 0;

        for subscription in subscriptions {
            let user = match self.ctx.users.find_by_id(subscription.user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, subscription_id = %subscription.id, "failed to load reminder recipient");
                    continue;
                }
            };

            let Some(days_remaining) = due_reminder(&subscription, &user, today) else {
                continue;
            };
            let Some(address) = user.reminder_address() else {
                continue;
            };

            let plan_name = match self.ctx.plans.find_by_id(subscription.plan_id).await {
                Ok(plan) => plan.map(|p| p.name).unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, plan_id = %subscription.plan_id, "failed to load plan name");
                    String::new()
                }
            };

            let reminder = Reminder {
                to: address.to_string(),
                username: user.username.clone(),
                plan_name,
                days_remaining,
            };

            if !self.dispatcher.enqueue(reminder) {
                continue;
            }

            if let Err(e) = self.ctx.subscriptions.mark_reminded(subscription.id, today).await {
                warn!(error = %e, subscription_id = %subscription.id, "failed to stamp reminder date");
            }

            debug!(subscription_id = %subscription.id, days_remaining, "reminder queued");
            queued += 1;
        }

        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quotasync_types::{PlanId, QuotaSnapshot, SubscriptionId, SubscriptionStatus, UserId};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn user(email: Option<&str>, remind_days: i32) -> User {
        User {
            id: UserId::new(),
            username: "alice".to_string(),
            email: email.map(str::to_string),
            binding: None,
            remind_enabled: true,
            remind_days,
            created_at: Utc::now(),
        }
    }

    fn subscription(end: NaiveDate) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            user_id: UserId::new(),
            plan_id: PlanId::new(),
            status: SubscriptionStatus::Active,
            start_date: day(1),
            end_date: end,
            today_quota: 100,
            carried_quota: 0,
            last_sync_date: None,
            last_reminder_date: None,
            sync_pending: false,
            last_order_id: None,
            snapshot: QuotaSnapshot {
                daily_quota: 100,
                carry_over: false,
                max_carry_over: 0,
                external_group: "default".to_string(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_within_lead_window() {
        let u = user(Some("a@example.com"), 3);
        assert_eq!(due_reminder(&subscription(day(13)), &u, day(10)), Some(3));
        assert_eq!(due_reminder(&subscription(day(10)), &u, day(10)), Some(0));
        assert_eq!(due_reminder(&subscription(day(14)), &u, day(10)), None);
    }

    #[test]
    fn test_lapsed_not_reminded() {
        let u = user(Some("a@example.com"), 3);
        assert_eq!(due_reminder(&subscription(day(9)), &u, day(10)), None);
    }

    #[test]
    fn test_requires_address() {
        assert_eq!(due_reminder(&subscription(day(11)), &user(None, 3), day(10)), None);
        assert_eq!(due_reminder(&subscription(day(11)), &user(Some("  "), 3), day(10)), None);
    }

    #[test]
    fn test_once_per_day() {
        let u = user(Some("a@example.com"), 3);
        let mut sub = subscription(day(11));
        sub.last_reminder_date = Some(day(10));
        assert_eq!(due_reminder(&sub, &u, day(10)), None);
        assert_eq!(due_reminder(&sub, &u, day(11)), Some(0));
    }
}
