//! Scripted in-memory gateway

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde_json::Map;

use quotasync_gateway::{ExternalAccount, GatewayError, GatewayResult, QuotaGateway, UsageEvent};
use quotasync_types::ExternalAccountId;

/// A mutating call seen by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Update {
        id: ExternalAccountId,
        quota: i64,
        group: String,
    },
    Create {
        username: String,
        group: String,
    },
}

/// Gateway double with per-account failure injection
#[derive(Default, Clone)]
pub struct MockGateway {
    accounts: Arc<DashMap<ExternalAccountId, ExternalAccount>>,
    passwords: Arc<DashMap<String, String>>,
    failing: Arc<DashSet<ExternalAccountId>>,
    down: Arc<AtomicBool>,
    next_id: Arc<AtomicI64>,
    usage: Arc<Mutex<Vec<UsageEvent>>>,
    calls: Arc<Mutex<Vec<GatewayCall>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        let gateway = Self::default();
        gateway.next_id.store(1000, Ordering::SeqCst);
        gateway
    }

    /// Add an account holding `quota`
    pub fn add_account(&self, id: i64, username: &str, quota: i64) -> ExternalAccountId {
        let id = ExternalAccountId(id);
        self.accounts.insert(
            id,
            ExternalAccount {
                id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role: 1,
                status: 1,
                quota,
                used_quota: 0,
                group: "default".to_string(),
                extra: Map::new(),
            },
        );
        id
    }

    /// Accept `password` for the account named `username`
    #[allow(dead_code)]
    pub fn set_password(&self, username: &str, password: &str) {
        self.passwords
            .insert(username.to_string(), password.to_string());
    }

    pub fn account(&self, id: ExternalAccountId) -> Option<ExternalAccount> {
        self.accounts.get(&id).map(|r| r.value().clone())
    }

    /// Overwrite the remaining balance, as if the user consumed quota
    pub fn set_quota(&self, id: ExternalAccountId, quota: i64) {
        if let Some(mut account) = self.accounts.get_mut(&id) {
            account.quota = quota;
        }
    }

    /// Make every call touching `id` fail as unavailable
    #[allow(dead_code)]
    pub fn fail_account(&self, id: ExternalAccountId, fail: bool) {
        if fail {
            self.failing.insert(id);
        } else {
            self.failing.remove(&id);
        }
    }

    /// Make every call fail as unavailable
    #[allow(dead_code)]
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn push_usage(&self, event: UsageEvent) {
        self.usage.lock().unwrap().push(event);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Quota values pushed to `id`, in order
    pub fn updates_for(&self, id: ExternalAccountId) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Update { id: target, quota, .. } if target == id => Some(quota),
                _ => None,
            })
            .collect()
    }

    fn check(&self, id: Option<ExternalAccountId>) -> GatewayResult<()> {
        if self.down.load(Ordering::SeqCst) || id.is_some_and(|id| self.failing.contains(&id)) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuotaGateway for MockGateway {
    async fn authenticate_admin(&self) -> GatewayResult<()> {
        self.check(None)
    }

    async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> GatewayResult<ExternalAccount> {
        self.check(None)?;
        let accepted = self
            .passwords
            .get(username)
            .is_some_and(|p| p.value() == password);
        if !accepted {
            return Err(GatewayError::InvalidCredentials(
                "username or password is wrong".to_string(),
            ));
        }
        self.accounts
            .iter()
            .find(|r| r.value().username == username)
            .map(|r| r.value().clone())
            .ok_or_else(|| GatewayError::InvalidCredentials("no such user".to_string()))
    }

    async fn fetch_account(&self, id: ExternalAccountId) -> GatewayResult<ExternalAccount> {
        self.check(Some(id))?;
        self.account(id).ok_or(GatewayError::AccountNotFound(id))
    }

    async fn update_account(
        &self,
        id: ExternalAccountId,
        quota: i64,
        group: &str,
    ) -> GatewayResult<()> {
        self.check(Some(id))?;
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or(GatewayError::AccountNotFound(id))?;
        account.quota = quota;
        account.group = group.to_string();
        self.calls.lock().unwrap().push(GatewayCall::Update {
            id,
            quota,
            group: group.to_string(),
        });
        Ok(())
    }

    async fn create_account(
        &self,
        username: &str,
        password: &str,
        group: &str,
    ) -> GatewayResult<ExternalAccountId> {
        self.check(None)?;
        if self.accounts.iter().any(|r| r.value().username == username) {
            return Err(GatewayError::Rejected("username already taken".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = self.add_account(id, username, 0);
        if let Some(mut account) = self.accounts.get_mut(&id) {
            account.group = group.to_string();
        }
        self.set_password(username, password);
        self.calls.lock().unwrap().push(GatewayCall::Create {
            username: username.to_string(),
            group: group.to_string(),
        });
        Ok(id)
    }

    async fn fetch_usage(
        &self,
        id: ExternalAccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GatewayResult<Vec<UsageEvent>> {
        self.check(Some(id))?;
        Ok(self
            .usage
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == id.0)
            .filter(|e| e.created_at >= from.timestamp() && e.created_at <= to.timestamp())
            .cloned()
            .collect())
    }

    async fn list_groups(&self) -> GatewayResult<Vec<String>> {
        self.check(None)?;
        Ok(vec!["default".to_string(), "vip".to_string()])
    }
}
