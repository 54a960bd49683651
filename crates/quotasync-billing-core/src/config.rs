//! Engine configuration

use std::fmt;
use std::str::FromStr;

/// What a `renew` order does when the user has no active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewFallback {
    /// Activate a fresh subscription, as a `new` order would
    #[default]
    Activate,
    /// Leave subscriptions untouched and log a warning
    Ignore,
}

impl RenewFallback {
    /// Configuration value
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Ignore => "ignore",
        }
    }
}

impl FromStr for RenewFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "activate" => Ok(Self::Activate),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown renew fallback: {other}")),
        }
    }
}

/// Engine settings
#[derive(Clone)]
pub struct EngineConfig {
    /// Password given to gateway accounts provisioned at settlement
    pub placeholder_password: String,
    /// Renewal behaviour without an active subscription
    pub renew_fallback: RenewFallback,
    /// Site name used in reminder mails
    pub site_name: String,
    /// Capacity of the reminder delivery queue
    pub reminder_queue_size: usize,
}

impl EngineConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self {
            placeholder_password: "temp_password".to_string(),
            renew_fallback: RenewFallback::default(),
            site_name: "Subscription Center".to_string(),
            reminder_queue_size: 256,
        }
    }

    /// Set the placeholder password for provisioned accounts
    pub fn with_placeholder_password(mut self, password: impl Into<String>) -> Self {
        self.placeholder_password = password.into();
        self
    }

    /// Set the renewal fallback
    pub fn with_renew_fallback(mut self, fallback: RenewFallback) -> Self {
        self.renew_fallback = fallback;
        self
    }

    /// Set the site name
    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = site_name.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("placeholder_password", &"[REDACTED]")
            .field("renew_fallback", &self.renew_fallback)
            .field("site_name", &self.site_name)
            .field("reminder_queue_size", &self.reminder_queue_size)
            .finish()
    }
}

/// SMTP relay settings
#[derive(Clone)]
pub struct SmtpConfig {
    /// Relay host
    pub server: String,
    /// Relay port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Sender address; falls back to `username`
    pub from: Option<String>,
}

impl SmtpConfig {
    /// Create a new SMTP config on the submission port
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: 587,
            username: username.into(),
            password: password.into(),
            from: None,
        }
    }

    /// Set the relay port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the sender address; blank values are ignored
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        let from = from.into();
        self.from = (!from.trim().is_empty()).then_some(from);
        self
    }

    /// Address mails are sent from
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from", &self.from)
            .finish()
    }
}
