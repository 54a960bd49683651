//! Reminder delivery

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::error::{BillingError, BillingResult};
use crate::metrics::record_reminder;

/// An expiry reminder for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Recipient address
    pub to: String,
    /// Recipient's username
    pub username: String,
    /// Name of the subscribed plan
    pub plan_name: String,
    /// Whole days until the end date
    pub days_remaining: i64,
}

impl Reminder {
    /// Mail subject
    pub fn subject(&self, site_name: &str) -> String {
        if self.days_remaining == 0 {
            format!("[{site_name}] Your subscription expires today")
        } else {
            format!(
                "[{site_name}] Your subscription expires in {} day{}",
                self.days_remaining,
                if self.days_remaining == 1 { "" } else { "s" }
            )
        }
    }

    /// HTML mail body
    pub fn html_body(&self, site_name: &str) -> String {
        let when = if self.days_remaining == 0 {
            "today".to_string()
        } else {
            format!("in <strong>{} days</strong>", self.days_remaining)
        };

        format!(
            r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">
<h2>Subscription expiry reminder</h2>
<p>Dear {username},</p>
<p>Your <strong>{plan}</strong> subscription expires {when}.</p>
<p>Please renew in time to keep your service uninterrupted.</p>
<p style="margin-top: 30px; color: #666;">{site}</p>
</div>"#,
            username = escape_html(&self.username),
            plan = escape_html(&self.plan_name),
            site = escape_html(site_name),
        )
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Outbound reminder channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one reminder
    async fn send_reminder(&self, reminder: &Reminder) -> BillingResult<()>;
}

/// Notifier that only logs, used when no SMTP relay is configured
#[derive(Debug, Clone)]
pub struct LogNotifier {
    site_name: String,
}

impl LogNotifier {
    /// Create a new log notifier
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> BillingResult<()> {
        info!(
            to = %reminder.to,
            username = %reminder.username,
            days_remaining = reminder.days_remaining,
            subject = %reminder.subject(&self.site_name),
            "smtp not configured, reminder logged only"
        );
        Ok(())
    }
}

/// SMTP notifier
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    site_name: String,
}

impl SmtpNotifier {
    /// Create a notifier for a relay; port 465 uses implicit TLS, others STARTTLS
    pub fn new(config: &SmtpConfig, site_name: impl Into<String>) -> BillingResult<Self> {
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
        }
        .map_err(|e| BillingError::NotificationRejected(e.to_string()))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = config
            .sender()
            .parse::<Mailbox>()
            .map_err(|e| BillingError::NotificationRejected(format!("sender address: {e}")))?;

        Ok(Self {
            transport,
            from,
            site_name: site_name.into(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> BillingResult<()> {
        let to = reminder
            .to
            .parse::<Mailbox>()
            .map_err(|e| BillingError::NotificationRejected(format!("recipient address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(reminder.subject(&self.site_name))
            .header(ContentType::TEXT_HTML)
            .body(reminder.html_body(&self.site_name))
            .map_err(|e| BillingError::NotificationRejected(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| BillingError::NotificationRejected(e.to_string()))?;

        Ok(())
    }
}

/// Fire-and-forget reminder queue drained by a background task
#[derive(Clone, Debug)]
pub struct ReminderDispatcher {
    tx: mpsc::Sender<Reminder>,
}

impl ReminderDispatcher {
    /// Create a dispatcher and spawn its delivery task
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        buffer_size: usize,
    ) -> (Self, ReminderDispatcherHandle) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));

        let handle = ReminderDispatcherHandle {
            task: tokio::spawn(Self::run_background(notifier, rx)),
        };

        (Self { tx }, handle)
    }

    /// Queue a reminder without waiting; returns whether it was accepted
    pub fn enqueue(&self, reminder: Reminder) -> bool {
        match self.tx.try_send(reminder) {
            Ok(()) => true,
            Err(TrySendError::Full(reminder)) => {
                warn!(to = %reminder.to, "reminder queue full, dropping reminder");
                record_reminder("dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("reminder delivery task stopped");
                record_reminder("dropped");
                false
            }
        }
    }

    async fn run_background(notifier: Arc<dyn Notifier>, mut rx: mpsc::Receiver<Reminder>) {
        while let Some(reminder) = rx.recv().await {
            match notifier.send_reminder(&reminder).await {
                Ok(()) => {
                    info!(to = %reminder.to, days_remaining = reminder.days_remaining, "reminder sent");
                    record_reminder("sent");
                }
                Err(e) => {
                    warn!(error = %e, to = %reminder.to, "failed to send reminder");
                    record_reminder("failed");
                }
            }
        }
    }
}

/// Handle for the background delivery task
pub struct ReminderDispatcherHandle {
    task: tokio::task::JoinHandle<()>,
}

impl ReminderDispatcherHandle {
    /// Wait for queued reminders to drain once every dispatcher clone is dropped
    pub async fn shutdown(self) {
        let _ = self.task.await;
    }
}
