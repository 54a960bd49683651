//! Daily pass scheduler

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use quotasync_billing_core::{BillingError, Reconciler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Cron expression accepting the standard 5-field form as well as the
/// seconds-first 6 and 7 field forms
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    /// The expression as configured
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }
}

impl FromStr for CronSchedule {
    type Err = cron::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expression = s.trim().to_string();
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {expression}")
        } else {
            expression.clone()
        };

        Ok(Self {
            schedule: Schedule::from_str(&normalized)?,
            expression,
        })
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

/// Run the reconciliation pass on `schedule` until `shutdown` fires.
///
/// A pass already in progress (for example one triggered by an
/// administrator) makes the scheduled run a no-op.
pub async fn run_scheduler(
    reconciler: Reconciler,
    schedule: CronSchedule,
    tz: Tz,
    shutdown: CancellationToken,
) {
    info!(schedule = %schedule.expression(), timezone = %tz, "Scheduler started");

    loop {
        let now = Utc::now().with_timezone(&tz);
        let Some(next) = schedule.next_after(&now) else {
            warn!(schedule = %schedule.expression(), "Schedule has no upcoming run, scheduler stopped");
            return;
        };
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(next_run = %next, "Next reconciliation pass scheduled");

        tokio::select! {
            () = shutdown.cancelled() => {
                info!("Scheduler stopped");
                return;
            }
            () = tokio::time::sleep(wait) => {}
        }

        match reconciler.run_pass().await {
            Ok(report) => info!(
                day = %report.day,
                synced = report.synced,
                expired = report.expired,
                failed = report.failed,
                "Scheduled reconciliation pass complete"
            ),
            Err(BillingError::PassAlreadyRunning) => {
                warn!("Reconciliation pass already running, scheduled run skipped");
            }
            Err(e) => error!(error = %e, "Scheduled reconciliation pass failed"),
        }
    }
}
