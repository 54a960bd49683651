//! Error types for the Subscribe API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use quotasync_billing_core::BillingError;
use quotasync_gateway::GatewayError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Billing(e) => match e {
                BillingError::OrderNotFound(_)
                | BillingError::UserNotFound(_)
                | BillingError::PlanNotFound(_)
                | BillingError::SubscriptionNotFound(_) => StatusCode::NOT_FOUND,
                BillingError::InvalidOrderState { .. }
                | BillingError::AlreadyBound
                | BillingError::AccountTakenByOtherUser
                | BillingError::PassAlreadyRunning => StatusCode::CONFLICT,
                BillingError::InvalidPeriod(_)
                | BillingError::NotBound
                | BillingError::InvalidSignature => StatusCode::BAD_REQUEST,
                BillingError::Gateway(GatewayError::InvalidCredentials(_)) => {
                    StatusCode::UNAUTHORIZED
                }
                BillingError::Gateway(GatewayError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                BillingError::Gateway(_) => StatusCode::BAD_GATEWAY,
                BillingError::Persistence(_) | BillingError::NotificationRejected(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Billing(e) => match e {
                BillingError::OrderNotFound(_) => "ORDER_NOT_FOUND",
                BillingError::UserNotFound(_) => "USER_NOT_FOUND",
                BillingError::PlanNotFound(_) => "PLAN_NOT_FOUND",
                BillingError::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
                BillingError::InvalidOrderState { .. } => "INVALID_ORDER_STATE",
                BillingError::InvalidPeriod(_) => "INVALID_PERIOD",
                BillingError::NotBound => "NOT_BOUND",
                BillingError::AlreadyBound => "ALREADY_BOUND",
                BillingError::AccountTakenByOtherUser => "ACCOUNT_TAKEN",
                BillingError::PassAlreadyRunning => "SYNC_IN_PROGRESS",
                BillingError::InvalidSignature => "INVALID_SIGNATURE",
                BillingError::Gateway(GatewayError::InvalidCredentials(_)) => {
                    "INVALID_CREDENTIALS"
                }
                BillingError::Gateway(GatewayError::Rejected(_)) => "UPSTREAM_REJECTED",
                BillingError::Gateway(_) => "UPSTREAM_UNAVAILABLE",
                BillingError::Persistence(_) | BillingError::NotificationRejected(_) => {
                    "INTERNAL_ERROR"
                }
            },
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let message = if self.is_internal() {
            tracing::error!(error = ?self, "Internal API error");
            "Internal error, retry later".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quotasync_db::DbError;
    use quotasync_types::SubscriptionId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Billing(BillingError::SubscriptionNotFound(SubscriptionId::new())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Billing(BillingError::PassAlreadyRunning),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Billing(BillingError::Gateway(GatewayError::Unavailable("x".into()))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Billing(BillingError::Persistence(DbError::NotFound)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error:?}");
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response =
            ApiError::Billing(BillingError::Persistence(DbError::Decode("secret".into())))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
