//! Gateway client configuration

use std::fmt;
use std::time::Duration;

/// Connection settings for the external quota service
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL without a trailing slash
    pub base_url: String,
    /// Administrator username
    pub admin_username: String,
    /// Administrator password
    pub admin_password: String,
    /// Value sent in the `New-Api-User` header on privileged calls
    pub admin_id: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long a cached admin session is reused
    pub session_ttl: Duration,
}

impl GatewayConfig {
    /// Create a new gateway config
    pub fn new(
        base_url: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            admin_id: None,
            timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(30 * 60),
        }
    }

    /// Set the admin id header value; blank values are ignored
    pub fn with_admin_id(mut self, admin_id: impl Into<String>) -> Self {
        let admin_id = admin_id.into();
        self.admin_id = (!admin_id.trim().is_empty()).then_some(admin_id);
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long an admin session is reused
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"[REDACTED]")
            .field("admin_id", &self.admin_id)
            .field("timeout", &self.timeout)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = GatewayConfig::new("http://gw.local/", "root", "pw");
        assert_eq!(config.url("/api/user/1"), "http://gw.local/api/user/1");
    }

    #[test]
    fn test_blank_admin_id_ignored() {
        let config = GatewayConfig::new("http://gw.local", "root", "pw").with_admin_id("  ");
        assert!(config.admin_id.is_none());

        let config = config.with_admin_id("1");
        assert_eq!(config.admin_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = GatewayConfig::new("http://gw.local", "root", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
