//! Configuration for the Subscribe API service.

use std::fmt;
use std::time::Duration;

use chrono_tz::Tz;
use quotasync_billing_core::{EngineConfig, RenewFallback, SmtpConfig};
use quotasync_gateway::GatewayConfig;

use crate::scheduler::CronSchedule;

/// Subscribe API configuration
#[derive(Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Shared key guarding `/api/v1/admin`
    pub admin_api_key: String,
    /// Key the payment provider signs notifications with
    pub payment_notify_key: String,
    /// Gateway client configuration
    pub gateway: GatewayConfig,
    /// Engine configuration
    pub engine: EngineConfig,
    /// SMTP relay; reminders are only logged when absent
    pub smtp: Option<SmtpConfig>,
    /// Whether the daily pass is scheduled
    pub cron_enabled: bool,
    /// When the daily pass runs
    pub cron_schedule: CronSchedule,
    /// Zone that defines "today"
    pub timezone: Tz,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url = required("DATABASE_URL")?;

        let http_port = parsed("HTTP_PORT", "8080")?;
        let admin_api_key = required("ADMIN_API_KEY")?;
        let payment_notify_key = required("PAYMENT_NOTIFY_KEY")?;

        // Gateway
        let gateway = GatewayConfig::new(
            required("NEWAPI_URL")?,
            required("NEWAPI_ADMIN_USER")?,
            required("NEWAPI_ADMIN_PASS")?,
        )
        .with_admin_id(optional("NEWAPI_ADMIN_ID").unwrap_or_default())
        .with_timeout(Duration::from_secs(parsed("NEWAPI_TIMEOUT_SECS", "10")?))
        .with_session_ttl(Duration::from_secs(parsed("NEWAPI_SESSION_TTL_SECS", "1800")?));

        // Engine
        let renew_fallback: RenewFallback = parsed("RENEW_WITHOUT_ACTIVE", "activate")?;
        let mut engine = EngineConfig::new().with_renew_fallback(renew_fallback);
        if let Some(password) = optional("PLACEHOLDER_PASSWORD") {
            engine = engine.with_placeholder_password(password);
        }
        if let Some(site_name) = optional("SITE_NAME") {
            engine = engine.with_site_name(site_name);
        }

        // Mail
        let smtp = match optional("SMTP_SERVER") {
            Some(server) => Some(
                SmtpConfig::new(
                    server,
                    optional("SMTP_USER").unwrap_or_default(),
                    optional("SMTP_PASS").unwrap_or_default(),
                )
                .with_port(parsed("SMTP_PORT", "587")?)
                .with_from(optional("SMTP_FROM").unwrap_or_default()),
            ),
            None => None,
        };

        // Scheduling
        let cron_enabled = parsed("CRON_ENABLED", "true")?;
        let cron_schedule = optional("CRON_SCHEDULE")
            .unwrap_or_else(|| "0 0 * * *".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("CRON_SCHEDULE"))?;
        let timezone = optional("TIMEZONE")
            .unwrap_or_else(|| "UTC".to_string())
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid("TIMEZONE"))?;

        let request_timeout_secs: u64 = parsed("REQUEST_TIMEOUT_SECS", "30")?;

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            http_port,
            database_url,
            admin_api_key,
            payment_notify_key,
            gateway,
            engine,
            smtp,
            cron_enabled,
            cron_schedule,
            timezone,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("database_url", &"[REDACTED]")
            .field("admin_api_key", &"[REDACTED]")
            .field("payment_notify_key", &"[REDACTED]")
            .field("gateway", &self.gateway)
            .field("engine", &self.engine)
            .field("smtp", &self.smtp)
            .field("cron_enabled", &self.cron_enabled)
            .field("cron_schedule", &self.cron_schedule)
            .field("timezone", &self.timezone)
            .field("request_timeout", &self.request_timeout)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    optional(name)
        .as_deref()
        .unwrap_or(default)
        .parse()
        .map_err(|_| ConfigError::Invalid(name))
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
