//! Subscription types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, ParseEnumError, PlanId, SubscriptionId, UserId};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Entitlement in force
    Active,
    /// Lapsed or superseded
    Expired,
    /// Cancelled by an administrator
    Cancelled,
}

impl SubscriptionStatus {
    /// Stable string form used in storage
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("subscription status", s)),
        }
    }
}

/// Plan quota settings captured when the subscription was bought.
///
/// Later edits to the plan never reach an existing subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Quota granted every day
    pub daily_quota: i64,
    /// Whether unused quota rolls over
    pub carry_over: bool,
    /// Cap on the rolled-over amount (0 = unbounded)
    pub max_carry_over: i64,
    /// Group assigned on the external gateway
    pub external_group: String,
}

/// A user's live entitlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID
    pub id: SubscriptionId,
    /// Owner
    pub user_id: UserId,
    /// Plan the subscription was bought from
    pub plan_id: PlanId,
    /// Status
    pub status: SubscriptionStatus,
    /// First entitled day
    pub start_date: NaiveDate,
    /// Last entitled day (inclusive)
    pub end_date: NaiveDate,
    /// Quota pushed to the gateway for the current day
    pub today_quota: i64,
    /// Part of `today_quota` that was carried over
    pub carried_quota: i64,
    /// Day of the last successful daily sync
    pub last_sync_date: Option<NaiveDate>,
    /// Day the last expiry reminder was queued
    pub last_reminder_date: Option<NaiveDate>,
    /// A best-effort gateway write failed and must be replayed
    pub sync_pending: bool,
    /// Last order applied to this subscription
    pub last_order_id: Option<OrderId>,
    /// Plan settings at purchase time
    pub snapshot: QuotaSnapshot,
    /// When the subscription was created
    pub created_at: DateTime<Utc>,
    /// When the subscription was last written
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription is in the active state
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Whether the end date lies strictly before `today`
    pub fn is_lapsed(&self, today: NaiveDate) -> bool {
        self.end_date < today
    }

    /// Whether the daily sync already ran for `today`
    pub fn synced_on(&self, today: NaiveDate) -> bool {
        self.last_sync_date == Some(today)
    }

    /// Whether a reminder was already queued for `today`
    pub fn reminded_on(&self, today: NaiveDate) -> bool {
        self.last_reminder_date == Some(today)
    }

    /// Whole days from `today` until the end date, negative once lapsed
    pub fn days_until_end(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days()
    }

    /// Entitled days left including today, for display
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        if !self.is_active() || self.is_lapsed(today) {
            return 0;
        }
        self.days_until_end(today) + 1
    }
}
