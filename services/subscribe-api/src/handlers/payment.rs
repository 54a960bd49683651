//! Payment provider callback

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use quotasync_billing_core::{BillingError, PaymentNotification, SettlementOutcome};
use tracing::{info, instrument, warn};

use crate::state::AppState;

/// Body the provider expects when the notification was handled
pub const ACK: &str = "success";
/// Body that makes the provider retry the notification
pub const NACK: &str = "fail";

/// GET /api/orders/notify
///
/// Answers `success` once the notification needs no further delivery, and
/// `fail` when the provider should retry it.
#[instrument(skip_all, fields(out_trade_no = tracing::field::Empty))]
pub async fn payment_notify(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> &'static str {
    let notification = PaymentNotification::new(params);
    if let Some(order_no) = notification.out_trade_no() {
        tracing::Span::current().record("out_trade_no", order_no);
    }

    if notification.verify(&state.config.payment_notify_key).is_err() {
        warn!("Payment notification signature rejected");
        metrics::counter!("quotasync_payment_notifications_total", "result" => "bad_signature")
            .increment(1);
        return NACK;
    }

    if !notification.is_trade_success() {
        info!(
            trade_status = notification.trade_status().unwrap_or_default(),
            "Ignoring non-success trade status"
        );
        metrics::counter!("quotasync_payment_notifications_total", "result" => "ignored")
            .increment(1);
        return ACK;
    }

    let (Some(order_no), Some(trade_no)) = (notification.out_trade_no(), notification.trade_no())
    else {
        warn!("Payment notification without order or trade number");
        return NACK;
    };

    let (reply, result) = match state.settlement.settle(order_no, trade_no).await {
        Ok(SettlementOutcome::Settled { .. }) => (ACK, "settled"),
        Ok(SettlementOutcome::AlreadySettled) => (ACK, "duplicate"),
        Err(BillingError::InvalidOrderState { status, .. }) => {
            warn!(status = %status, "Payment for an order that can no longer be settled");
            (ACK, "invalid_state")
        }
        Err(_) => (NACK, "error"),
    };

    metrics::counter!("quotasync_payment_notifications_total", "result" => result).increment(1);
    reply
}
