//! Quotasync Billing Core - Subscription lifecycle engine
//!
//! Settles paid orders into subscriptions, runs the daily quota
//! reconciliation pass with carry-over, and queues expiry reminders.
//!
//! # Example
//!
//! ```rust,ignore
//! use quotasync_billing_core::{
//!     EngineConfig, EngineContext, LogNotifier, Reconciler, ReminderDispatcher,
//!     ReminderEvaluator, SettlementService, SystemClock,
//! };
//!
//! let ctx = EngineContext::new(repos, Arc::new(gateway), Arc::new(SystemClock::default()));
//! let settlement = SettlementService::new(ctx.clone(), EngineConfig::default());
//! settlement.settle("SUB20240601120000abcd1234", "T1").await?;
//!
//! let (dispatcher, _handle) = ReminderDispatcher::spawn(Arc::new(LogNotifier::new("Shop")), 256);
//! let reconciler = Reconciler::new(ctx.clone(), ReminderEvaluator::new(ctx, dispatcher));
//! let report = reconciler.run_pass().await?;
//! ```

pub mod binding;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod locks;
pub mod metrics;
pub mod notifier;
pub mod payment;
pub mod period;
pub mod quota;
pub mod reconcile;
pub mod reminder;
pub mod settlement;
pub mod usage;

pub use binding::BindingService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, RenewFallback, SmtpConfig};
pub use context::EngineContext;
pub use error::{BillingError, BillingResult};
pub use locks::UserLocks;
pub use notifier::{
    LogNotifier, Notifier, Reminder, ReminderDispatcher, ReminderDispatcherHandle, SmtpNotifier,
};
pub use payment::PaymentNotification;
pub use period::extend_end_date;
pub use quota::{next_allotment, DailyAllotment};
pub use reconcile::{PassPermit, PassReport, Reconciler, ResyncResult, SyncOutcome};
pub use reminder::{due_reminder, ReminderEvaluator};
pub use settlement::{SettlementOutcome, SettlementService, SubscriptionChange};
pub use usage::UsageService;
