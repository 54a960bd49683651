//! Daily reconciliation pass
//!
//! Advances every active subscription by one billing day: expires lapsed
//! subscriptions, rolls unused quota forward per the plan snapshot, pushes
//! the result to the gateway and records it locally. Each subscription is
//! handled on its own; one failure never stops the pass.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

use quotasync_db::RecordSync;
use quotasync_types::{ExternalAccountId, Subscription, SubscriptionId};

use crate::context::EngineContext;
use crate::error::{BillingError, BillingResult};
use crate::metrics::{record_pass_duration, record_reconciled};
use crate::quota::{next_allotment, DailyAllotment};
use crate::reminder::ReminderEvaluator;

/// What the pass did with one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// New daily quota pushed and recorded
    Synced(DailyAllotment),
    /// Already advanced today
    AlreadySynced,
    /// End date passed; subscription expired
    Expired,
    /// Owner has no gateway account
    Unbound,
    /// Row changed under the pass (renewed, superseded or cancelled)
    Superseded,
    /// Gateway or persistence failure; retried next pass
    Failed,
}

impl SyncOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Synced(_) => "synced",
            Self::AlreadySynced => "already_synced",
            Self::Expired => "expired",
            Self::Unbound => "unbound",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        }
    }
}

/// Summary of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub day: NaiveDate,
    pub synced: usize,
    pub already_synced: usize,
    pub expired: usize,
    pub unbound: usize,
    pub superseded: usize,
    pub failed: usize,
    pub backlog_cleared: usize,
    pub backlog_failed: usize,
    pub reminders_queued: usize,
}

impl PassReport {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            synced: 0,
            already_synced: 0,
            expired: 0,
            unbound: 0,
            superseded: 0,
            failed: 0,
            backlog_cleared: 0,
            backlog_failed: 0,
            reminders_queued: 0,
        }
    }

    fn record(&mut self, outcome: SyncOutcome) {
        record_reconciled(outcome.as_str());
        match outcome {
            SyncOutcome::Synced(_) => self.synced += 1,
            SyncOutcome::AlreadySynced => self.already_synced += 1,
            SyncOutcome::Expired => self.expired += 1,
            SyncOutcome::Unbound => self.unbound += 1,
            SyncOutcome::Superseded => self.superseded += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }
}

/// Exclusive right to run a pass
pub struct PassPermit {
    _guard: OwnedMutexGuard<()>,
}

/// Result of an administrative re-sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncResult {
    pub subscription_id: SubscriptionId,
    pub external_id: ExternalAccountId,
    pub quota: i64,
    pub group: String,
}

/// Runs reconciliation passes
#[derive(Debug, Clone)]
pub struct Reconciler {
    ctx: EngineContext,
    reminders: ReminderEvaluator,
    running: Arc<Mutex<()>>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(ctx: EngineContext, reminders: ReminderEvaluator) -> Self {
        Self {
            ctx,
            reminders,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Reserve the pass slot, failing when a pass is already running
    pub fn try_begin(&self) -> BillingResult<PassPermit> {
        Arc::clone(&self.running)
            .try_lock_owned()
            .map(|guard| PassPermit { _guard: guard })
            .map_err(|_| BillingError::PassAlreadyRunning)
    }

    /// Run a full pass for today
    pub async fn run_pass(&self) -> BillingResult<PassReport> {
        let permit = self.try_begin()?;
        self.run_with(permit).await
    }

    /// Run a full pass holding an already reserved slot
    #[instrument(skip(self, _permit))]
    pub async fn run_with(&self, _permit: PassPermit) -> BillingResult<PassReport> {
        let started = Instant::now();
        let today = self.ctx.clock.today();
        info!(day = %today, "reconciliation pass started");

        let mut report = PassReport::new(today);
        self.drain_backlog(today, &mut report).await;

        let active = match self.ctx.subscriptions.list_active().await {
            Ok(active) => active,
            Err(e) => {
                error!(error = %e, "failed to list active subscriptions");
                return Err(e.into());
            }
        };

        for subscription in active {
            let id = subscription.id;
            let outcome = match self.reconcile(subscription, today).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_upstream() => {
                    warn!(error = %e, subscription_id = %id, "gateway failure, subscription left for next pass");
                    SyncOutcome::Failed
                }
                Err(e) => {
                    error!(error = %e, subscription_id = %id, "failed to reconcile subscription");
                    SyncOutcome::Failed
                }
            };
            report.record(outcome);
        }

        report.reminders_queued = match self.reminders.evaluate(today).await {
            Ok(queued) => queued,
            Err(e) => {
                error!(error = %e, "reminder evaluation failed");
                0
            }
        };

        record_pass_duration(started.elapsed());
        info!(
            day = %today,
            synced = report.synced,
            already_synced = report.already_synced,
            expired = report.expired,
            unbound = report.unbound,
            superseded = report.superseded,
            failed = report.failed,
            backlog_cleared = report.backlog_cleared,
            backlog_failed = report.backlog_failed,
            reminders_queued = report.reminders_queued,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reconciliation pass finished"
        );

        Ok(report)
    }

    /// Advance one subscription under its owner's lock
    async fn reconcile(&self, listed: Subscription, today: NaiveDate) -> BillingResult<SyncOutcome> {
        let _guard = self.ctx.locks.lock(listed.user_id).await;

        let Some(subscription) = self.ctx.subscriptions.find_by_id(listed.id).await? else {
            return Ok(SyncOutcome::Superseded);
        };
        if !subscription.is_active() {
            return Ok(SyncOutcome::Superseded);
        }

        let external_id = self
            .ctx
            .users
            .find_by_id(subscription.user_id)
            .await?
            .and_then(|user| user.external_id());

        if subscription.is_lapsed(today) {
            return self.expire(&subscription, external_id).await;
        }
        if subscription.synced_on(today) {
            return Ok(SyncOutcome::AlreadySynced);
        }
        let Some(external_id) = external_id else {
            debug!(subscription_id = %subscription.id, "owner not bound, skipping");
            return Ok(SyncOutcome::Unbound);
        };

        let remaining = self.ctx.gateway.fetch_account(external_id).await?.quota;
        let allotment = next_allotment(&subscription.snapshot, remaining);

        self.ctx
            .gateway
            .update_account(external_id, allotment.quota, &subscription.snapshot.external_group)
            .await?;

        let applied = self
            .ctx
            .subscriptions
            .record_sync(
                subscription.id,
                RecordSync {
                    today_quota: allotment.quota,
                    carried_quota: allotment.carried,
                    synced_on: today,
                    expected_end_date: subscription.end_date,
                },
            )
            .await?;

        if !applied {
            warn!(subscription_id = %subscription.id, "subscription changed during sync, not recorded");
            return Ok(SyncOutcome::Superseded);
        }

        info!(
            subscription_id = %subscription.id,
            external_id = %external_id,
            remaining,
            carried = allotment.carried,
            quota = allotment.quota,
            "subscription synced"
        );
        Ok(SyncOutcome::Synced(allotment))
    }

    async fn expire(
        &self,
        subscription: &Subscription,
        external_id: Option<ExternalAccountId>,
    ) -> BillingResult<SyncOutcome> {
        if !self.ctx.subscriptions.expire(subscription.id).await? {
            return Ok(SyncOutcome::Superseded);
        }
        info!(
            subscription_id = %subscription.id,
            end_date = %subscription.end_date,
            "subscription expired"
        );

        if let Some(external_id) = external_id {
            let zeroed = self
                .ctx
                .gateway
                .update_account(external_id, 0, &subscription.snapshot.external_group)
                .await;

            if let Err(e) = zeroed {
                warn!(
                    error = %e,
                    subscription_id = %subscription.id,
                    external_id = %external_id,
                    "failed to zero expired quota, queued for next pass"
                );
                self.ctx
                    .subscriptions
                    .set_sync_pending(subscription.id, true)
                    .await?;
            }
        }

        Ok(SyncOutcome::Expired)
    }

    /// Replay gateway writes that failed earlier
    async fn drain_backlog(&self, today: NaiveDate, report: &mut PassReport) {
        let pending = match self.ctx.subscriptions.list_sync_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "failed to list pending gateway writes");
                return;
            }
        };

        for subscription in pending {
            match self.replay(&subscription, today).await {
                Ok(true) => report.backlog_cleared += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, subscription_id = %subscription.id, "pending gateway write failed again");
                    report.backlog_failed += 1;
                }
            }
        }
    }

    /// Push the recorded state of one flagged subscription.
    ///
    /// Lapsed or expired rows push zero unless the owner already holds
    /// another active subscription, in which case the flag is just cleared.
    async fn replay(&self, listed: &Subscription, today: NaiveDate) -> BillingResult<bool> {
        let _guard = self.ctx.locks.lock(listed.user_id).await;

        let Some(subscription) = self.ctx.subscriptions.find_by_id(listed.id).await? else {
            return Ok(false);
        };
        if !subscription.sync_pending {
            return Ok(false);
        }

        let Some(external_id) = self
            .ctx
            .users
            .find_by_id(subscription.user_id)
            .await?
            .and_then(|user| user.external_id())
        else {
            return Ok(false);
        };

        let quota = if subscription.is_active() && !subscription.is_lapsed(today) {
            subscription.today_quota
        } else {
            // The account now belongs to a newer subscription.
            let successor = self
                .ctx
                .subscriptions
                .find_active_by_user_id(subscription.user_id)
                .await?
                .filter(|active| active.id != subscription.id);
            if let Some(successor) = successor {
                self.ctx
                    .subscriptions
                    .set_sync_pending(subscription.id, false)
                    .await?;
                info!(
                    subscription_id = %subscription.id,
                    successor_id = %successor.id,
                    "pending gateway write dropped for superseded subscription"
                );
                return Ok(true);
            }
            0
        };

        self.ctx
            .gateway
            .update_account(external_id, quota, &subscription.snapshot.external_group)
            .await?;
        self.ctx
            .subscriptions
            .set_sync_pending(subscription.id, false)
            .await?;

        info!(subscription_id = %subscription.id, quota, "pending gateway write replayed");
        Ok(true)
    }

    /// Push one active subscription's recorded quota and group to the gateway
    #[instrument(skip(self))]
    pub async fn resync_subscription(&self, id: SubscriptionId) -> BillingResult<ResyncResult> {
        let listed = self
            .ctx
            .subscriptions
            .find_by_id(id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound(id))?;

        let _guard = self.ctx.locks.lock(listed.user_id).await;

        let subscription = self
            .ctx
            .subscriptions
            .find_by_id(id)
            .await?
            .filter(Subscription::is_active)
            .ok_or(BillingError::SubscriptionNotFound(id))?;

        let external_id = self
            .ctx
            .users
            .find_by_id(subscription.user_id)
            .await?
            .ok_or(BillingError::UserNotFound(subscription.user_id))?
            .external_id()
            .ok_or(BillingError::NotBound)?;

        let group = subscription.snapshot.external_group.clone();
        self.ctx
            .gateway
            .update_account(external_id, subscription.today_quota, &group)
            .await?;

        if subscription.sync_pending {
            self.ctx
                .subscriptions
                .set_sync_pending(subscription.id, false)
                .await?;
        }

        info!(subscription_id = %id, external_id = %external_id, quota = subscription.today_quota, "subscription re-synced");

        Ok(ResyncResult {
            subscription_id: id,
            external_id,
            quota: subscription.today_quota,
            group,
        })
    }
}
