//! HTTP client for the gateway control API

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::header::COOKIE;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use quotasync_types::ExternalAccountId;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::QuotaGateway;
use crate::models::{CreateAccountRequest, Envelope, ExternalAccount, LoginRequest, UsageEvent};
use crate::session::{cookie_header, AdminSession};

/// Metric name for gateway calls
pub const GATEWAY_REQUESTS_TOTAL: &str = "quotasync_gateway_requests_total";

const ADMIN_USER_HEADER: &str = "New-Api-User";

/// Gateway client with a cached administrator session.
///
/// The session belongs to this client instance; clones share it. End-user
/// logins go through the same HTTP client but never replace the admin
/// session.
#[derive(Clone)]
pub struct NewApiClient {
    http: Client,
    config: GatewayConfig,
    session: Arc<Mutex<Option<AdminSession>>>,
}

impl NewApiClient {
    /// Create a new client
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            config,
            session: Arc::new(Mutex::new(None)),
        })
    }

    /// Drop the cached admin session so the next privileged call logs in again
    pub async fn invalidate_session(&self) {
        *self.session.lock().await = None;
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> GatewayResult<(ExternalAccount, String)> {
        let response = self
            .http
            .post(self.config.url("/api/user/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "gateway login request failed");
                GatewayError::from_transport(&e)
            })?;

        let response = check_status(response)?;
        let cookie = cookie_header(response.headers());
        let envelope: Envelope<ExternalAccount> = decode(response).await?;

        if !envelope.success {
            return Err(GatewayError::InvalidCredentials(envelope.message));
        }

        let account = envelope
            .data
            .ok_or_else(|| GatewayError::Decode("login response without account".to_string()))?;

        Ok((account, cookie))
    }

    /// Cookie of a valid admin session, logging in when the cache is empty or stale.
    ///
    /// The lock is held across the login so concurrent callers share one login.
    async fn admin_cookie(&self) -> GatewayResult<String> {
        let mut session = self.session.lock().await;

        if let Some(current) = session.as_ref() {
            if current.is_fresh(self.config.session_ttl) {
                return Ok(current.cookie().to_string());
            }
        }

        debug!("refreshing gateway admin session");
        let (_, cookie) = self
            .login(&self.config.admin_username, &self.config.admin_password)
            .await
            .map_err(|e| GatewayError::AuthFailed(e.to_string()))?;

        if cookie.is_empty() {
            return Err(GatewayError::AuthFailed(
                "admin login returned no session cookie".to_string(),
            ));
        }

        info!("gateway admin session established");
        *session = Some(AdminSession::new(cookie.clone()));
        Ok(cookie)
    }

    async fn admin_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> GatewayResult<Envelope<T>> {
        let cookie = self.admin_cookie().await?;

        let mut request = self
            .http
            .request(method, self.config.url(path))
            .header(COOKIE, cookie);

        if let Some(admin_id) = &self.config.admin_id {
            request = request.header(ADMIN_USER_HEADER, admin_id);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, path = %path, "gateway request failed");
            GatewayError::from_transport(&e)
        })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let status = response.status();
                self.invalidate_session().await;
                warn!(status = %status, path = %path, "gateway refused admin session");
                Err(GatewayError::AuthFailed(format!(
                    "admin session refused: {status}"
                )))
            }
            StatusCode::NOT_FOUND => Ok(Envelope {
                success: false,
                message: "not found".to_string(),
                data: None,
            }),
            _ => decode(check_status(response)?).await,
        }
    }

    async fn fetch_account_raw(&self, id: ExternalAccountId) -> GatewayResult<ExternalAccount> {
        let envelope: Envelope<ExternalAccount> = self
            .admin_request(Method::GET, &format!("/api/user/{id}"), &[], None)
            .await?;

        if !envelope.success {
            debug!(external_id = %id, message = %envelope.message, "gateway account lookup refused");
            return Err(GatewayError::AccountNotFound(id));
        }

        envelope
            .data
            .ok_or_else(|| GatewayError::Decode(format!("account {id} response without data")))
    }
}

fn check_status(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        warn!(status = %status, "gateway answered with an error status");
        return Err(GatewayError::Unavailable(format!("status {status}")));
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<Envelope<T>> {
    let status = response.status();
    response.json::<Envelope<T>>().await.map_err(|e| {
        warn!(error = %e, status = %status, "failed to parse gateway response");
        GatewayError::Decode(e.to_string())
    })
}

fn rejected_unless_success<T>(envelope: Envelope<T>) -> GatewayResult<Envelope<T>> {
    if envelope.success {
        Ok(envelope)
    } else {
        Err(GatewayError::Rejected(envelope.message))
    }
}

fn record<T>(operation: &'static str, result: &GatewayResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(GatewayError::AuthFailed(_)) => "auth_failed",
        Err(GatewayError::InvalidCredentials(_)) => "invalid_credentials",
        Err(GatewayError::Unavailable(_) | GatewayError::Decode(_)) => "unavailable",
        Err(GatewayError::Rejected(_)) => "rejected",
        Err(GatewayError::AccountNotFound(_)) => "not_found",
    };
    counter!(GATEWAY_REQUESTS_TOTAL, "operation" => operation, "result" => outcome).increment(1);
}

#[async_trait]
impl QuotaGateway for NewApiClient {
    #[instrument(skip(self))]
    async fn authenticate_admin(&self) -> GatewayResult<()> {
        let result = self.admin_cookie().await.map(|_| ());
        record("authenticate_admin", &result);
        result
    }

    #[instrument(skip(self, password))]
    async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> GatewayResult<ExternalAccount> {
        let result = self.login(username, password).await.map(|(account, _)| account);
        record("authenticate_user", &result);
        result
    }

    #[instrument(skip(self))]
    async fn fetch_account(&self, id: ExternalAccountId) -> GatewayResult<ExternalAccount> {
        let result = self.fetch_account_raw(id).await;
        record("fetch_account", &result);
        result
    }

    #[instrument(skip(self))]
    async fn update_account(
        &self,
        id: ExternalAccountId,
        quota: i64,
        group: &str,
    ) -> GatewayResult<()> {
        let result: GatewayResult<()> = async {
            let mut account = self.fetch_account_raw(id).await?;
            account.quota = quota;
            account.group = group.to_string();

            let body =
                serde_json::to_value(&account).map_err(|e| GatewayError::Decode(e.to_string()))?;
            let envelope: Envelope<Value> = self
                .admin_request(Method::PUT, "/api/user/", &[], Some(body))
                .await?;
            rejected_unless_success(envelope).map(|_| ())
        }
        .await;

        record("update_account", &result);
        if result.is_ok() {
            debug!(external_id = %id, quota, group = %group, "gateway account updated");
        }
        result
    }

    #[instrument(skip(self, password))]
    async fn create_account(
        &self,
        username: &str,
        password: &str,
        group: &str,
    ) -> GatewayResult<ExternalAccountId> {
        let result: GatewayResult<ExternalAccountId> = async {
            let body = serde_json::to_value(CreateAccountRequest {
                username,
                password,
                display_name: username,
                group,
            })
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

            let envelope: Envelope<ExternalAccount> = self
                .admin_request(Method::POST, "/api/user/", &[], Some(body))
                .await?;
            let envelope = rejected_unless_success(envelope)?;

            envelope
                .data
                .map(|account| account.id)
                .filter(|id| id.0 > 0)
                .ok_or_else(|| GatewayError::Decode("create response without account id".to_string()))
        }
        .await;

        record("create_account", &result);
        result
    }

    #[instrument(skip(self))]
    async fn fetch_usage(
        &self,
        id: ExternalAccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<UsageEvent>> {
        let query = [
            ("user_id", id.to_string()),
            ("start_timestamp", from.timestamp().to_string()),
            ("end_timestamp", to.timestamp().to_string()),
        ];

        let result: GatewayResult<Vec<UsageEvent>> = async {
            let envelope: Envelope<Vec<UsageEvent>> = self
                .admin_request(Method::GET, "/api/log/", &query, None)
                .await?;
            Ok(rejected_unless_success(envelope)?.data.unwrap_or_default())
        }
        .await;

        record("fetch_usage", &result);
        result
    }

    #[instrument(skip(self))]
    async fn list_groups(&self) -> GatewayResult<Vec<String>> {
        let result: GatewayResult<Vec<String>> = async {
            let envelope: Envelope<Vec<String>> = self
                .admin_request(Method::GET, "/api/group/", &[], None)
                .await?;
            Ok(rejected_unless_success(envelope)?.data.unwrap_or_default())
        }
        .await;

        record("list_groups", &result);
        result
    }
}
