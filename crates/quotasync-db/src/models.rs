//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive and
//! convert into the domain types from `quotasync-types`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use quotasync_types::{
    ExternalAccountId, ExternalBinding, Order, OrderId, Plan, PlanId, QuotaSnapshot, Subscription,
    SubscriptionId, User, UserId,
};

use crate::DbError;

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub external_bound: bool,
    pub external_id: Option<i64>,
    pub external_username: Option<String>,
    pub remind_enabled: bool,
    pub remind_days: i32,
    pub created_at: DateTime<Utc>,
}

/// Plan row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub period_kind: String,
    pub period_days: i32,
    pub daily_quota: i64,
    pub carry_over: bool,
    pub max_carry_over: i64,
    pub price_model: String,
    pub price_cents: i64,
    pub external_group: String,
    pub active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Order row from the database
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub kind: String,
    pub period_days: i32,
    pub amount_cents: i64,
    pub payment_method: Option<String>,
    pub trade_no: Option<String>,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Subscription row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub today_quota: i64,
    pub carried_quota: i64,
    pub last_sync_date: Option<NaiveDate>,
    pub last_reminder_date: Option<NaiveDate>,
    pub sync_pending: bool,
    pub last_order_id: Option<Uuid>,
    pub daily_quota: i64,
    pub carry_over: bool,
    pub max_carry_over: i64,
    pub external_group: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn parse_column<T>(value: &str) -> Result<T, DbError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| DbError::Decode(e.to_string()))
}

fn non_negative_days(value: i32) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::Decode(format!("negative period_days: {value}")))
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let binding = match (row.external_bound, row.external_id) {
            (true, Some(id)) => Some(ExternalBinding {
                external_id: ExternalAccountId(id),
                external_username: row.external_username.unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            id: UserId(row.id),
            username: row.username,
            email: row.email,
            binding,
            remind_enabled: row.remind_enabled,
            remind_days: row.remind_days,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<PlanRow> for Plan {
    type Error = DbError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PlanId(row.id),
            name: row.name,
            description: row.description,
            period_kind: parse_column(&row.period_kind)?,
            period_days: non_negative_days(row.period_days)?,
            daily_quota: row.daily_quota,
            carry_over: row.carry_over,
            max_carry_over: row.max_carry_over,
            price_model: parse_column(&row.price_model)?,
            price_cents: row.price_cents,
            external_group: row.external_group,
            active: row.active,
            sort_order: row.sort_order,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId(row.id),
            order_no: row.order_no,
            user_id: UserId(row.user_id),
            plan_id: PlanId(row.plan_id),
            kind: parse_column(&row.kind)?,
            period_days: non_negative_days(row.period_days)?,
            amount_cents: row.amount_cents,
            payment_method: row.payment_method,
            trade_no: row.trade_no,
            status: parse_column(&row.status)?,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubscriptionId(row.id),
            user_id: UserId(row.user_id),
            plan_id: PlanId(row.plan_id),
            status: parse_column(&row.status)?,
            start_date: row.start_date,
            end_date: row.end_date,
            today_quota: row.today_quota,
            carried_quota: row.carried_quota,
            last_sync_date: row.last_sync_date,
            last_reminder_date: row.last_reminder_date,
            sync_pending: row.sync_pending,
            last_order_id: row.last_order_id.map(OrderId),
            snapshot: QuotaSnapshot {
                daily_quota: row.daily_quota,
                carry_over: row.carry_over,
                max_carry_over: row.max_carry_over,
                external_group: row.external_group,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
