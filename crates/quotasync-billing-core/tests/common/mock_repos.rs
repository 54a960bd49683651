//! In-memory repositories for testing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;

use quotasync_db::{
    CreateSubscription, CreateUser, DbError, DbResult, OrderRepository, PlanRepository,
    RecordSync, SubscriptionRepository, UserRepository,
};
use quotasync_types::{
    ExternalAccountId, ExternalBinding, Order, OrderId, OrderStatus, Plan, PlanId, Subscription,
    SubscriptionId, SubscriptionStatus, User, UserId,
};

/// In-memory user repository
#[derive(Default, Clone)]
pub struct MockUserRepository {
    users: Arc<DashMap<UserId, User>>,
}

impl MockUserRepository {
    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn get(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|r| r.value().clone())
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalAccountId,
    ) -> DbResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|r| r.value().external_id() == Some(external_id))
            .map(|r| r.value().clone()))
    }

    async fn create(&self, user: CreateUser) -> DbResult<User> {
        let row = User {
            id: user.id,
            username: user.username,
            email: user.email,
            binding: user.binding,
            remind_enabled: true,
            remind_days: 3,
            created_at: Utc::now(),
        };
        self.insert(row.clone());
        Ok(row)
    }

    async fn set_binding(&self, id: UserId, binding: &ExternalBinding) -> DbResult<()> {
        let mut user = self.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.binding = Some(binding.clone());
        Ok(())
    }
}

/// In-memory plan repository
#[derive(Default, Clone)]
pub struct MockPlanRepository {
    plans: Arc<DashMap<PlanId, Plan>>,
}

impl MockPlanRepository {
    pub fn insert(&self, plan: Plan) {
        self.plans.insert(plan.id, plan);
    }
}

#[async_trait]
impl PlanRepository for MockPlanRepository {
    async fn find_by_id(&self, id: PlanId) -> DbResult<Option<Plan>> {
        Ok(self.plans.get(&id).map(|r| r.value().clone()))
    }
}

/// In-memory order repository
#[derive(Default, Clone)]
pub struct MockOrderRepository {
    orders: Arc<DashMap<OrderId, Order>>,
    fail_next_mark_paid: Arc<AtomicBool>,
}

impl MockOrderRepository {
    pub fn insert(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id).map(|r| r.value().clone())
    }

    /// Make the next `mark_paid` fail with a persistence error
    #[allow(dead_code)]
    pub fn fail_next_mark_paid(&self) {
        self.fail_next_mark_paid.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for MockOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> DbResult<Option<Order>> {
        Ok(self.get(id))
    }

    async fn find_by_order_no(&self, order_no: &str) -> DbResult<Option<Order>> {
        Ok(self
            .orders
            .iter()
            .find(|r| r.value().order_no == order_no)
            .map(|r| r.value().clone()))
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        trade_no: &str,
        paid_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        if self.fail_next_mark_paid.swap(false, Ordering::SeqCst) {
            return Err(DbError::Decode("order store unavailable".to_string()));
        }
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != OrderStatus::Pending {
            return Ok(false);
        }
        order.status = OrderStatus::Paid;
        order.trade_no = Some(trade_no.to_string());
        order.paid_at = Some(paid_at);
        Ok(true)
    }
}

/// In-memory subscription repository honouring the conditional updates
#[derive(Default, Clone)]
pub struct MockSubscriptionRepository {
    subscriptions: Arc<DashMap<SubscriptionId, Subscription>>,
    fail_listing: Arc<AtomicBool>,
    fail_next_create: Arc<AtomicBool>,
}

impl MockSubscriptionRepository {
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions.insert(subscription.id, subscription);
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.get(&id).map(|r| r.value().clone())
    }

    /// All subscriptions of a user, oldest first
    pub fn for_user(&self, user_id: UserId) -> Vec<Subscription> {
        let mut subs: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        subs.sort_by_key(|s| s.created_at);
        subs
    }

    /// Make `list_active` fail with a persistence error
    #[allow(dead_code)]
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make the next `create` fail with a persistence error
    #[allow(dead_code)]
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    fn list_where(&self, keep: impl Fn(&Subscription) -> bool) -> Vec<Subscription> {
        let mut subs: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect();
        subs.sort_by_key(|s| s.end_date);
        subs
    }

    fn update_active(&self, id: SubscriptionId, f: impl FnOnce(&mut Subscription)) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(mut sub) if sub.is_active() => {
                f(&mut sub);
                sub.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn find_by_id(&self, id: SubscriptionId) -> DbResult<Option<Subscription>> {
        Ok(self.get(id))
    }

    async fn find_active_by_user_id(&self, user_id: UserId) -> DbResult<Option<Subscription>> {
        Ok(self
            .list_where(|s| s.user_id == user_id && s.is_active())
            .into_iter()
            .max_by_key(|s| s.end_date))
    }

    async fn list_active(&self) -> DbResult<Vec<Subscription>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(DbError::Decode("listing disabled".to_string()));
        }
        Ok(self.list_where(Subscription::is_active))
    }

    async fn list_sync_pending(&self) -> DbResult<Vec<Subscription>> {
        Ok(self.list_where(|s| s.sync_pending))
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<Subscription> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(DbError::Decode("subscription store unavailable".to_string()));
        }
        let now = Utc::now();
        let row = Subscription {
            id: sub.id,
            user_id: sub.user_id,
            plan_id: sub.plan_id,
            status: SubscriptionStatus::Active,
            start_date: sub.start_date,
            end_date: sub.end_date,
            today_quota: sub.today_quota,
            carried_quota: 0,
            last_sync_date: sub.last_sync_date,
            last_reminder_date: None,
            sync_pending: false,
            last_order_id: Some(sub.order_id),
            snapshot: sub.snapshot,
            created_at: now,
            updated_at: now,
        };
        self.insert(row.clone());
        Ok(row)
    }

    async fn expire_active_for_user(&self, user_id: UserId) -> DbResult<u64> {
        let mut changed = 0;
        for mut sub in self.subscriptions.iter_mut() {
            if sub.user_id == user_id && sub.is_active() {
                sub.status = SubscriptionStatus::Expired;
                sub.sync_pending = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn expire(&self, id: SubscriptionId) -> DbResult<bool> {
        Ok(self.update_active(id, |s| s.status = SubscriptionStatus::Expired))
    }

    async fn extend_end_date(
        &self,
        id: SubscriptionId,
        end_date: NaiveDate,
        order_id: OrderId,
    ) -> DbResult<bool> {
        Ok(self.update_active(id, |s| {
            s.end_date = end_date;
            s.last_order_id = Some(order_id);
        }))
    }

    async fn record_sync(&self, id: SubscriptionId, update: RecordSync) -> DbResult<bool> {
        match self.subscriptions.get_mut(&id) {
            Some(mut sub) if sub.is_active() && sub.end_date == update.expected_end_date => {
                sub.today_quota = update.today_quota;
                sub.carried_quota = update.carried_quota;
                sub.last_sync_date = Some(update.synced_on);
                sub.sync_pending = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_sync_pending(&self, id: SubscriptionId, pending: bool) -> DbResult<()> {
        if let Some(mut sub) = self.subscriptions.get_mut(&id) {
            sub.sync_pending = pending;
        }
        Ok(())
    }

    async fn mark_reminded(&self, id: SubscriptionId, on: NaiveDate) -> DbResult<()> {
        if let Some(mut sub) = self.subscriptions.get_mut(&id) {
            sub.last_reminder_date = Some(on);
        }
        Ok(())
    }
}
