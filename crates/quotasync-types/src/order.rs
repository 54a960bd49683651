//! Order types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, ParseEnumError, PlanId, UserId};

/// Whether an order starts a new subscription or extends the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Fresh purchase
    New,
    /// Extension of the active subscription
    Renew,
}

impl OrderKind {
    /// Stable string form used in storage
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Renew => "renew",
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "renew" => Ok(Self::Renew),
            _ => Err(ParseEnumError::new("order kind", s)),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting payment
    Pending,
    /// Paid and settled
    Paid,
    /// Abandoned
    Cancelled,
    /// Money returned
    Refunded,
}

impl OrderStatus {
    /// Stable string form used in storage
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether no further transition is possible
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ParseEnumError::new("order status", s)),
        }
    }
}

/// A purchase intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Unique human-facing order number
    pub order_no: String,
    /// Buyer
    pub user_id: UserId,
    /// Purchased plan
    pub plan_id: PlanId,
    /// New purchase or renewal
    pub kind: OrderKind,
    /// Purchased period length in days
    pub period_days: u32,
    /// Amount in cents
    pub amount_cents: i64,
    /// Payment channel chosen by the buyer
    pub payment_method: Option<String>,
    /// Trade reference reported by the payment gateway
    pub trade_no: Option<String>,
    /// Order status
    pub status: OrderStatus,
    /// When the payment was confirmed
    pub paid_at: Option<DateTime<Utc>>,
    /// When the order was created
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Trade reference used for administrative settlement
    pub fn manual_trade_no(&self) -> String {
        format!("MANUAL_{}", self.order_no)
    }
}

/// Build an order number from the buyer and a timestamp in nanoseconds
pub fn generate_order_no(user_id: &UserId, now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
    let short = user_id.0.simple().to_string();
    format!("SUB{}{}", &short[..8], nanos)
}
