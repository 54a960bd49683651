//! Billing errors

use thiserror::Error;

use quotasync_db::DbError;
use quotasync_gateway::GatewayError;
use quotasync_types::{OrderStatus, PlanId, SubscriptionId, UserId};

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Order not found
    #[error("order {0} not found")]
    OrderNotFound(String),

    /// User not found
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Plan not found
    #[error("plan {0} not found")]
    PlanNotFound(PlanId),

    /// Subscription not found
    #[error("subscription {0} not found")]
    SubscriptionNotFound(SubscriptionId),

    /// Order cannot be settled from its current status
    #[error("order {order_no} is {status}")]
    InvalidOrderState {
        /// Order number
        order_no: String,
        /// Current status
        status: OrderStatus,
    },

    /// Period arithmetic rejected the purchase
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// User has no gateway account
    #[error("user is not bound to a gateway account")]
    NotBound,

    /// User already has a gateway account
    #[error("user is already bound to a gateway account")]
    AlreadyBound,

    /// Gateway account belongs to another local user
    #[error("gateway account is bound to another user")]
    AccountTakenByOtherUser,

    /// A reconciliation pass is in progress
    #[error("a reconciliation pass is already running")]
    PassAlreadyRunning,

    /// Payment notification signature mismatch
    #[error("invalid payment notification signature")]
    InvalidSignature,

    /// Notification could not be built or delivered
    #[error("notification rejected: {0}")]
    NotificationRejected(String),

    /// Persistence failure
    #[error("persistence error: {0}")]
    Persistence(#[from] DbError),

    /// Remote quota service failure
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Result alias for engine operations
pub type BillingResult<T> = Result<T, BillingError>;

impl BillingError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::OrderNotFound(_)
                | Self::UserNotFound(_)
                | Self::PlanNotFound(_)
                | Self::SubscriptionNotFound(_)
        )
    }

    /// Check if the failure came from the remote quota service
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }

    /// Check if the caller may retry the same operation later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence(_) | Self::PassAlreadyRunning => true,
            Self::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}
