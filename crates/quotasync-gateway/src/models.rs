//! Wire types of the gateway control API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use quotasync_types::ExternalAccountId;

/// A remote account as returned by the gateway.
///
/// Fields this crate does not model are kept in `extra` so an account can be
/// written back without dropping them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub id: ExternalAccountId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: i32,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub quota: i64,
    #[serde(default)]
    pub used_quota: i64,
    #[serde(default)]
    pub group: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One itemised usage log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: i64,
    pub user_id: i64,
    /// Unix seconds
    pub created_at: i64,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub quota: i64,
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
}

impl UsageEvent {
    /// Event time, if the timestamp is representable
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }
}

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateAccountRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    pub group: &'a str,
}
