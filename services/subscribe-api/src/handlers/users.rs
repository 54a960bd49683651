//! Account binding and usage handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quotasync_gateway::UsageEvent;
use quotasync_types::UserId;

use crate::error::{ApiError, ApiResult};
use crate::handlers::admin::AdminKey;
use crate::state::AppState;

/// Widest usage window served in one request
const MAX_USAGE_WINDOW_DAYS: i64 = 31;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct BindRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BindRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct BindResponse {
    pub user_id: UserId,
    pub external_id: Option<i64>,
    pub external_username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_quota: i64,
    pub events: Vec<UsageEvent>,
}

#[derive(Debug, Serialize)]
pub struct UsedTodayResponse {
    pub used_today: i64,
}

fn parse_user_id(raw: &str) -> ApiResult<UserId> {
    UserId::parse(raw).map_err(|_| ApiError::BadRequest("Invalid user_id".into()))
}

/// Resolve the requested window, defaulting to the last day
fn usage_window(query: &UsageQuery, now: DateTime<Utc>) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let to = query.to.unwrap_or(now);
    let from = query.from.unwrap_or(to - Duration::days(1));

    if from > to {
        return Err(ApiError::BadRequest("from must not be after to".into()));
    }
    if to - from > Duration::days(MAX_USAGE_WINDOW_DAYS) {
        return Err(ApiError::BadRequest(format!(
            "Usage window too wide (max {MAX_USAGE_WINDOW_DAYS} days)"
        )));
    }
    Ok((from, to))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/users/{user_id}/bind
#[instrument(skip(state, _admin, req), fields(username = %req.username))]
pub async fn bind_account(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<BindRequest>,
) -> ApiResult<Json<BindResponse>> {
    let user_id = parse_user_id(&user_id)?;
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("username and password are required".into()));
    }

    let user = state
        .binding
        .bind_existing(user_id, req.username.trim(), &req.password)
        .await?;

    Ok(Json(BindResponse {
        user_id: user.id,
        external_id: user.external_id().map(|id| id.0),
        external_username: user.binding.map(|b| b.external_username),
    }))
}

/// GET /api/v1/users/{user_id}/usage?from=&to=
#[instrument(skip(state, _admin))]
pub async fn get_usage(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<UsageResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let (from, to) = usage_window(&query, Utc::now())?;

    let events = state.usage.usage_between(user_id, from, to).await?;
    let total_quota = events.iter().map(|e| e.quota).sum();

    Ok(Json(UsageResponse {
        from,
        to,
        total_quota,
        events,
    }))
}

/// GET /api/v1/users/{user_id}/usage/today
#[instrument(skip(state, _admin))]
pub async fn get_used_today(
    _admin: AdminKey,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UsedTodayResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let used_today = state.usage.used_today(user_id).await?;
    Ok(Json(UsedTodayResponse { used_today }))
}
