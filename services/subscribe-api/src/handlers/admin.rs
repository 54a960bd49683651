//! Administrative handlers

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{error, info, instrument};

use quotasync_billing_core::{BillingError, SettlementOutcome, SubscriptionChange};
use quotasync_types::SubscriptionId;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the shared admin key
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Proof that the request carried the admin key
#[derive(Debug)]
pub struct AdminKey;

impl FromRequestParts<AppState> for AdminKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected = state.config.admin_api_key.as_bytes();
        if bool::from(provided.as_bytes().ct_eq(expected)) {
            Ok(Self)
        } else {
            tracing::warn!("Rejected request with wrong admin key");
            Err(ApiError::Unauthorized)
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CompleteOrderResponse {
    pub order_no: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<SubscriptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SyncTriggerResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ResyncResponse {
    pub subscription_id: SubscriptionId,
    pub external_id: i64,
    pub quota: i64,
    pub group: String,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/admin/orders/{order_no}/complete
#[instrument(skip(state, _admin))]
pub async fn complete_order(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(order_no): Path<String>,
) -> ApiResult<Json<CompleteOrderResponse>> {
    let outcome = state.settlement.settle_manually(&order_no).await?;

    let response = match outcome {
        SettlementOutcome::AlreadySettled => CompleteOrderResponse {
            order_no,
            outcome: "already_settled",
            subscription_id: None,
            end_date: None,
        },
        SettlementOutcome::Settled { change, .. } => {
            let end_date = match &change {
                SubscriptionChange::Created { end_date, .. }
                | SubscriptionChange::Extended { end_date, .. } => Some(*end_date),
                SubscriptionChange::Unchanged => None,
            };
            CompleteOrderResponse {
                order_no,
                outcome: "settled",
                subscription_id: change.subscription_id(),
                end_date,
            }
        }
    };

    Ok(Json(response))
}

/// POST /api/v1/admin/sync/trigger
///
/// Starts a pass in the background; a pass already in progress answers 409.
pub async fn trigger_sync(
    _admin: AdminKey,
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<SyncTriggerResponse>)> {
    let permit = state.reconciler.try_begin()?;
    let reconciler = state.reconciler.clone();

    tokio::spawn(async move {
        match reconciler.run_with(permit).await {
            Ok(report) => info!(
                day = %report.day,
                synced = report.synced,
                failed = report.failed,
                "Manual reconciliation pass complete"
            ),
            Err(e) => error!(error = %e, "Manual reconciliation pass failed"),
        }
    });

    info!("Manual reconciliation pass started");
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncTriggerResponse { status: "started" }),
    ))
}

/// POST /api/v1/admin/sync/resync/{subscription_id}
#[instrument(skip(state, _admin))]
pub async fn resync_subscription(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> ApiResult<Json<ResyncResponse>> {
    let id = SubscriptionId::parse(&subscription_id)
        .map_err(|_| ApiError::BadRequest("Invalid subscription_id".into()))?;

    let result = state.reconciler.resync_subscription(id).await?;

    Ok(Json(ResyncResponse {
        subscription_id: result.subscription_id,
        external_id: result.external_id.0,
        quota: result.quota,
        group: result.group,
    }))
}

/// GET /api/v1/admin/groups
pub async fn list_groups(
    _admin: AdminKey,
    State(state): State<AppState>,
) -> ApiResult<Json<GroupsResponse>> {
    let groups = state
        .gateway
        .list_groups()
        .await
        .map_err(BillingError::from)?;

    Ok(Json(GroupsResponse { groups }))
}
