//! Plan types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParseEnumError, PlanId, QuotaSnapshot};

/// How a plan's period length is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// Billed per day
    Day,
    /// Billed in whole weeks
    Week,
    /// Billed in calendar months
    Month,
    /// Buyer chooses the number of days
    Custom,
}

impl PeriodKind {
    /// Stable string form used in storage
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PeriodKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "custom" => Ok(Self::Custom),
            _ => Err(ParseEnumError::new("period kind", s)),
        }
    }
}

/// Price model of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceModel {
    /// One price for the whole period
    Fixed,
    /// Price multiplied by the number of purchased days
    PerDay,
}

impl PriceModel {
    /// Stable string form used in storage
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::PerDay => "daily",
        }
    }
}

impl std::fmt::Display for PriceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriceModel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "daily" | "per_day" => Ok(Self::PerDay),
            _ => Err(ParseEnumError::new("price model", s)),
        }
    }
}

/// A purchasable plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Plan ID
    pub id: PlanId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Period kind
    pub period_kind: PeriodKind,
    /// Default period length in days
    pub period_days: u32,
    /// Quota granted every day
    pub daily_quota: i64,
    /// Whether unused quota rolls into the next day
    pub carry_over: bool,
    /// Cap on the rolled-over amount (0 = unbounded)
    pub max_carry_over: i64,
    /// Price model
    pub price_model: PriceModel,
    /// Price in cents (per period or per day, see `price_model`)
    pub price_cents: i64,
    /// Group assigned on the external gateway
    pub external_group: String,
    /// Whether the plan can be purchased
    pub active: bool,
    /// Listing order
    pub sort_order: i32,
    /// When the plan was created
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Price in cents for a purchase of `days` days
    pub fn price_for(&self, days: u32) -> i64 {
        match self.price_model {
            PriceModel::Fixed => self.price_cents,
            PriceModel::PerDay => self.price_cents.saturating_mul(i64::from(days)),
        }
    }

    /// Number of days actually purchased for a requested length.
    ///
    /// Only custom plans honour the buyer's choice.
    pub fn purchase_days(&self, requested: Option<u32>) -> u32 {
        match (self.period_kind, requested) {
            (PeriodKind::Custom, Some(days)) if days > 0 => days,
            _ => self.period_days,
        }
    }

    /// Quota settings frozen into a subscription at purchase time
    pub fn snapshot(&self) -> QuotaSnapshot {
        QuotaSnapshot {
            daily_quota: self.daily_quota,
            carry_over: self.carry_over,
            max_carry_over: self.max_carry_over,
            external_group: self.external_group.clone(),
        }
    }
}
