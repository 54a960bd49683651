//! Engine metrics
//!
//! - `quotasync_settlements_total{result}` - settlement attempts
//! - `quotasync_reconciled_subscriptions_total{outcome}` - per-subscription pass outcomes
//! - `quotasync_reminders_sent_total{result}` - reminder deliveries
//! - `quotasync_pass_duration_seconds` - reconciliation pass latency

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric name for settlements.
pub const SETTLEMENTS_TOTAL: &str = "quotasync_settlements_total";

/// Metric name for reconciled subscriptions.
pub const RECONCILED_SUBSCRIPTIONS_TOTAL: &str = "quotasync_reconciled_subscriptions_total";

/// Metric name for reminders.
pub const REMINDERS_SENT_TOTAL: &str = "quotasync_reminders_sent_total";

/// Metric name for the pass duration histogram.
pub const PASS_DURATION_SECONDS: &str = "quotasync_pass_duration_seconds";

pub(crate) fn record_settlement(result: &'static str) {
    counter!(SETTLEMENTS_TOTAL, "result" => result).increment(1);
}

pub(crate) fn record_reconciled(outcome: &'static str) {
    counter!(RECONCILED_SUBSCRIPTIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_reminder(result: &'static str) {
    counter!(REMINDERS_SENT_TOTAL, "result" => result).increment(1);
}

pub(crate) fn record_pass_duration(elapsed: Duration) {
    histogram!(PASS_DURATION_SECONDS).record(elapsed.as_secs_f64());
}
