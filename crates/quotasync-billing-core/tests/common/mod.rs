//! Common test utilities for quotasync-billing-core integration tests

pub mod mock_gateway;
pub mod mock_repos;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use quotasync_billing_core::{
    BillingResult, EngineConfig, EngineContext, FixedClock, Notifier, Reconciler, Reminder,
    ReminderDispatcher, ReminderDispatcherHandle, ReminderEvaluator, SettlementService,
};
use quotasync_types::{
    ExternalAccountId, ExternalBinding, Order, OrderId, OrderKind, OrderStatus,
    PeriodKind, Plan, PlanId, PriceModel, Subscription, SubscriptionId, SubscriptionStatus, User,
    UserId,
};

#[allow(unused_imports)]
pub use mock_gateway::{GatewayCall, MockGateway};
#[allow(unused_imports)]
pub use mock_repos::{
    MockOrderRepository, MockPlanRepository, MockSubscriptionRepository, MockUserRepository,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Notifier that keeps every reminder it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Reminder>>,
}

impl RecordingNotifier {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<Reminder> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> BillingResult<()> {
        self.sent.lock().unwrap().push(reminder.clone());
        Ok(())
    }
}

/// Engine wired to in-memory stores, a mock gateway and a fixed clock
pub struct Harness {
    pub users: MockUserRepository,
    pub plans: MockPlanRepository,
    pub orders: MockOrderRepository,
    pub subscriptions: MockSubscriptionRepository,
    pub gateway: MockGateway,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: EngineContext,
    dispatcher: ReminderDispatcher,
    dispatcher_handle: ReminderDispatcherHandle,
}

impl Harness {
    pub fn new(today: NaiveDate) -> Self {
        let users = MockUserRepository::default();
        let plans = MockPlanRepository::default();
        let orders = MockOrderRepository::default();
        let subscriptions = MockSubscriptionRepository::default();
        let gateway = MockGateway::new();
        let clock = Arc::new(FixedClock::on(today));
        let notifier = Arc::new(RecordingNotifier::default());

        let ctx = EngineContext {
            users: Arc::new(users.clone()),
            plans: Arc::new(plans.clone()),
            orders: Arc::new(orders.clone()),
            subscriptions: Arc::new(subscriptions.clone()),
            gateway: Arc::new(gateway.clone()),
            clock: clock.clone(),
            locks: Default::default(),
        };

        let (dispatcher, dispatcher_handle) = ReminderDispatcher::spawn(notifier.clone(), 64);

        Self {
            users,
            plans,
            orders,
            subscriptions,
            gateway,
            clock,
            notifier,
            ctx,
            dispatcher,
            dispatcher_handle,
        }
    }

    #[allow(dead_code)]
    pub fn settlement(&self, config: EngineConfig) -> SettlementService {
        SettlementService::new(self.ctx.clone(), config)
    }

    #[allow(dead_code)]
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.ctx.clone(),
            ReminderEvaluator::new(self.ctx.clone(), self.dispatcher.clone()),
        )
    }

    /// Drop the engine's queue and wait for queued reminders to be delivered
    #[allow(dead_code)]
    pub async fn flush_reminders(self) -> Arc<RecordingNotifier> {
        let Self {
            notifier,
            ctx,
            dispatcher,
            dispatcher_handle,
            ..
        } = self;
        drop(ctx);
        drop(dispatcher);
        dispatcher_handle.shutdown().await;
        notifier
    }

    pub fn add_plan(&self, plan: Plan) -> Plan {
        self.plans.insert(plan.clone());
        plan
    }

    /// Add a user, bound to `external` when given
    pub fn add_user(&self, name: &str, external: Option<ExternalAccountId>) -> User {
        let user = User {
            id: UserId::new(),
            username: name.to_string(),
            email: Some(format!("{name}@example.com")),
            binding: external.map(|external_id| ExternalBinding {
                external_id,
                external_username: name.to_string(),
            }),
            remind_enabled: true,
            remind_days: 3,
            created_at: Utc::now(),
        };
        self.users.insert(user.clone());
        user
    }

    pub fn add_order(&self, user: &User, plan: &Plan, kind: OrderKind, days: u32) -> Order {
        let order = Order {
            id: OrderId::new(),
            order_no: format!("SUB{}", OrderId::new().0.simple()),
            user_id: user.id,
            plan_id: plan.id,
            kind,
            period_days: days,
            amount_cents: plan.price_for(days),
            payment_method: Some("alipay".to_string()),
            trade_no: None,
            status: OrderStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        };
        self.orders.insert(order.clone());
        order
    }

    /// Add an active subscription ending on `end_date`
    pub fn add_subscription(&self, user: &User, plan: &Plan, end_date: NaiveDate) -> Subscription {
        let now = Utc::now();
        let sub = Subscription {
            id: SubscriptionId::new(),
            user_id: user.id,
            plan_id: plan.id,
            status: SubscriptionStatus::Active,
            start_date: end_date - chrono::Days::new(30),
            end_date,
            today_quota: plan.daily_quota,
            carried_quota: 0,
            last_sync_date: None,
            last_reminder_date: None,
            sync_pending: false,
            last_order_id: None,
            snapshot: plan.snapshot(),
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.insert(sub.clone());
        sub
    }
}

/// Monthly plan with `daily` quota per day
pub fn plan(daily: i64, carry_over: bool, max_carry_over: i64) -> Plan {
    Plan {
        id: PlanId::new(),
        name: "Pro".to_string(),
        description: String::new(),
        period_kind: PeriodKind::Month,
        period_days: 30,
        daily_quota: daily,
        carry_over,
        max_carry_over,
        price_model: PriceModel::Fixed,
        price_cents: 9900,
        external_group: "vip".to_string(),
        active: true,
        sort_order: 0,
        created_at: Utc::now(),
    }
}
