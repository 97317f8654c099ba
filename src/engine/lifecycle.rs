use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::engine::audit::{AuditEntry, AuditLog, AuditOutcome};
use crate::engine::availability::compute_driver_availability;
use crate::engine::permissions::{authorize, can_view, Permission};
use crate::engine::policy::{check_delete, plan_assignment, plan_create, plan_edit, plan_transition, Plan};
use crate::error::LifecycleError;
use crate::models::actor::Actor;
use crate::models::driver::{Directory, Driver, DriverView, Person};
use crate::models::event::{OrderEvent, OrderEventKind};
use crate::models::ids::{CustomerId, DriverId, OrderId};
use crate::models::order::{NewOrder, Order, OrderPatch, OrderStatus};
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateOrder,
    AssignDriver,
    AdvanceStatus,
    EditOrder,
    DeleteOrder,
    RegisterDriver,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateOrder => "create_order",
            Operation::AssignDriver => "assign_driver",
            Operation::AdvanceStatus => "advance_status",
            Operation::EditOrder => "edit_order",
            Operation::DeleteOrder => "delete_order",
            Operation::RegisterDriver => "register_driver",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub search: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        let status_matches = self.status.is_none_or(|status| order.status == status);
        let search_matches = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                order.pickup_address.to_lowercase().contains(&term)
                    || order.delivery_address.to_lowercase().contains(&term)
            }
        };
        status_matches && search_matches
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub picked_up: usize,
    pub delivered: usize,
    pub cancelled: usize,
    /// Sum of `amount` over orders that were not cancelled.
    pub booked_amount: f64,
}

impl OrderStats {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut stats = OrderStats::default();
        for order in orders {
            stats.total += 1;
            match order.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Processing => stats.processing += 1,
                OrderStatus::PickedUp => stats.picked_up += 1,
                OrderStatus::Delivered => stats.delivered += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
            }
            if order.status != OrderStatus::Cancelled {
                stats.booked_amount += order.amount;
            }
        }
        stats.booked_amount = (stats.booked_amount * 100.0).round() / 100.0;
        stats
    }
}

struct Committed<T> {
    value: T,
    order_id: OrderId,
    customer_id: CustomerId,
    assignee: Option<DriverId>,
    event: OrderEventKind,
}

impl Committed<Order> {
    fn order(order: Order, assignee: Option<DriverId>, event: OrderEventKind) -> Self {
        Self {
            order_id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            assignee: order.driver_id.clone().or(assignee),
            value: order,
            event,
        }
    }
}

/// Enforces the order state machine and the role matrix on top of an
/// [`OrderStore`]. Holds no order state; every call reads what it needs and
/// commits through a guarded update.
///
/// Cloning is cheap and shares the audit log, event channel and metrics.
#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn OrderStore>,
    audit: Arc<AuditLog>,
    events_tx: broadcast::Sender<OrderEvent>,
    metrics: Metrics,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn OrderStore>,
        metrics: Metrics,
        audit_capacity: usize,
        event_buffer_size: usize,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            store,
            audit: Arc::new(AuditLog::new(audit_capacity)),
            events_tx,
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// A manager whose store calls carry the caller's session token. Stores
    /// without per-caller credentials are shared as is.
    pub fn with_session(&self, token: &str) -> Self {
        Self {
            store: self
                .store
                .scoped(token)
                .unwrap_or_else(|| self.store.clone()),
            ..self.clone()
        }
    }

    /// Adds a driver to the fleet, or updates the profile of a known one.
    pub async fn register_driver(
        &self,
        driver: Driver,
        actor: &Actor,
    ) -> Result<Driver, LifecycleError> {
        let started = Instant::now();
        let result = self.try_register_driver(driver, actor).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        self.metrics.observe_operation(
            Operation::RegisterDriver.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );

        let (audit_outcome, details) = match &result {
            Ok(driver) => {
                info!(driver_id = %driver.id, actor_id = %actor.id, "driver registered");
                (AuditOutcome::Success, format!("driver {} registered", driver.id))
            }
            Err(err) => {
                warn!(actor_id = %actor.id, error = %err, "driver registration rejected");
                (AuditOutcome::Failed, err.to_string())
            }
        };
        self.audit
            .record(AuditEntry::new(
                actor,
                Operation::RegisterDriver.as_str(),
                None,
                audit_outcome,
                details,
            ))
            .await;

        result
    }

    pub async fn create_order(
        &self,
        payload: NewOrder,
        actor: &Actor,
    ) -> Result<Order, LifecycleError> {
        let started = Instant::now();
        let result = self.try_create(payload, actor).await;
        self.settle(Operation::CreateOrder, actor, None, started, result)
            .await
    }

    pub async fn assign_driver(
        &self,
        order_id: &OrderId,
        driver_id: &DriverId,
        actor: &Actor,
    ) -> Result<Order, LifecycleError> {
        let started = Instant::now();
        let result = self.try_assign(order_id, driver_id, actor).await;
        self.settle(Operation::AssignDriver, actor, Some(order_id), started, result)
            .await
    }

    pub async fn advance_status(
        &self,
        order_id: &OrderId,
        target: OrderStatus,
        actor: &Actor,
    ) -> Result<Order, LifecycleError> {
        let started = Instant::now();
        let result = self.try_advance(order_id, target, actor).await;
        self.settle(Operation::AdvanceStatus, actor, Some(order_id), started, result)
            .await
    }

    pub async fn edit_order(
        &self,
        order_id: &OrderId,
        patch: &OrderPatch,
        actor: &Actor,
    ) -> Result<Order, LifecycleError> {
        let started = Instant::now();
        let result = self.try_edit(order_id, patch, actor).await;
        self.settle(Operation::EditOrder, actor, Some(order_id), started, result)
            .await
    }

    pub async fn delete_order(&self, order_id: &OrderId, actor: &Actor) -> Result<(), LifecycleError> {
        let started = Instant::now();
        let result = self.try_delete(order_id, actor).await;
        self.settle(Operation::DeleteOrder, actor, Some(order_id), started, result)
            .await
    }

    pub async fn get_order(&self, order_id: &OrderId, actor: &Actor) -> Result<Order, LifecycleError> {
        let order = self.store.get_order(order_id).await?;
        if !can_view(actor, &order) {
            return Err(LifecycleError::Unauthorized(format!(
                "{} may not read order {order_id}",
                actor.role
            )));
        }
        Ok(order)
    }

    pub async fn list_orders(
        &self,
        actor: &Actor,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, LifecycleError> {
        let orders = self.store.list_orders().await?;
        Ok(orders
            .into_iter()
            .filter(|order| can_view(actor, order) && filter.matches(order))
            .collect())
    }

    pub async fn order_stats(&self, actor: &Actor) -> Result<OrderStats, LifecycleError> {
        let visible = self.list_orders(actor, &OrderFilter::default()).await?;
        Ok(OrderStats::from_orders(&visible))
    }

    pub async fn list_drivers(&self, actor: &Actor) -> Result<Vec<DriverView>, LifecycleError> {
        authorize(actor, Permission::ViewDrivers)?;

        let drivers = self.store.list_drivers().await?;
        let orders = self.store.list_orders().await?;

        Ok(drivers
            .into_iter()
            .map(|driver| DriverView {
                is_available: compute_driver_availability(&driver.id, &orders),
                driver,
            })
            .collect())
    }

    pub async fn driver_availability(
        &self,
        driver_id: &DriverId,
        actor: &Actor,
    ) -> Result<bool, LifecycleError> {
        if !actor.is_driver(Some(driver_id)) {
            authorize(actor, Permission::ViewDrivers)?;
        }

        let orders = self.store.list_orders().await?;
        Ok(compute_driver_availability(driver_id, &orders))
    }

    pub async fn list_directory(
        &self,
        directory: Directory,
        actor: &Actor,
    ) -> Result<Vec<Person>, LifecycleError> {
        authorize(actor, Permission::ViewDirectory)?;
        Ok(self.store.list_directory(directory).await?)
    }

    pub async fn audit_log(&self, actor: &Actor) -> Result<Vec<AuditEntry>, LifecycleError> {
        authorize(actor, Permission::ViewAudit)?;
        Ok(self.audit.entries().await)
    }

    async fn try_create(
        &self,
        payload: NewOrder,
        actor: &Actor,
    ) -> Result<Committed<Order>, LifecycleError> {
        let draft = plan_create(payload, actor)?;
        let order = self.store.insert_order(draft).await?;

        Ok(Committed::order(order, None, OrderEventKind::Created))
    }

    async fn try_register_driver(
        &self,
        mut driver: Driver,
        actor: &Actor,
    ) -> Result<Driver, LifecycleError> {
        authorize(actor, Permission::ManageDrivers)?;

        let id = driver.id.as_str().trim();
        if id.is_empty() {
            return Err(LifecycleError::Validation("driver id is required".to_string()));
        }
        driver.id = DriverId::new(id);

        driver.fullname = driver.fullname.trim().to_string();
        if driver.fullname.is_empty() {
            return Err(LifecycleError::Validation("fullname is required".to_string()));
        }

        Ok(self.store.register_driver(driver).await?)
    }

    async fn try_assign(
        &self,
        order_id: &OrderId,
        driver_id: &DriverId,
        actor: &Actor,
    ) -> Result<Committed<Order>, LifecycleError> {
        authorize(actor, Permission::AssignDriver)?;

        let order = self.store.get_order(order_id).await?;
        let all_orders = self.store.list_orders().await?;
        let plan = plan_assignment(&order, driver_id, actor, &all_orders)?;

        let drivers = self.store.list_drivers().await?;
        if !drivers.iter().any(|driver| &driver.id == driver_id) {
            return Err(LifecycleError::Validation(format!(
                "unknown driver {driver_id}"
            )));
        }

        self.commit(order_id, plan).await
    }

    async fn try_advance(
        &self,
        order_id: &OrderId,
        target: OrderStatus,
        actor: &Actor,
    ) -> Result<Committed<Order>, LifecycleError> {
        let order = self.store.get_order(order_id).await?;
        let plan = plan_transition(&order, target, actor)?;
        self.commit(order_id, plan).await
    }

    async fn try_edit(
        &self,
        order_id: &OrderId,
        patch: &OrderPatch,
        actor: &Actor,
    ) -> Result<Committed<Order>, LifecycleError> {
        if !actor.role.is_staff_tier() {
            authorize(actor, Permission::EditOwnOrder)?;
        }

        let order = self.store.get_order(order_id).await?;
        let plan = plan_edit(&order, patch, actor)?;
        self.commit(order_id, plan).await
    }

    async fn try_delete(
        &self,
        order_id: &OrderId,
        actor: &Actor,
    ) -> Result<Committed<()>, LifecycleError> {
        check_delete(actor)?;
        let order = self.store.get_order(order_id).await?;
        self.store.delete_order(order_id).await?;

        Ok(Committed {
            value: (),
            order_id: order.id,
            customer_id: order.customer_id,
            assignee: order.driver_id,
            event: OrderEventKind::Deleted,
        })
    }

    async fn commit(&self, order_id: &OrderId, plan: Plan) -> Result<Committed<Order>, LifecycleError> {
        let order = self
            .store
            .update_order(order_id, &plan.guard, &plan.update)
            .await?;

        Ok(Committed::order(
            order,
            plan.guard.expected_driver_id,
            plan.event,
        ))
    }

    async fn settle<T>(
        &self,
        operation: Operation,
        actor: &Actor,
        order_id: Option<&OrderId>,
        started: Instant,
        result: Result<Committed<T>, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(committed) => {
                self.metrics
                    .observe_operation(operation.as_str(), "success", elapsed);
                if let OrderEventKind::StatusChanged { from, to } = &committed.event {
                    self.metrics
                        .transitions_total
                        .with_label_values(&[from.as_str(), to.as_str()])
                        .inc();
                }
                if let OrderEventKind::DriverAssigned { .. } = &committed.event {
                    self.metrics
                        .transitions_total
                        .with_label_values(&[
                            OrderStatus::Pending.as_str(),
                            OrderStatus::Processing.as_str(),
                        ])
                        .inc();
                }

                info!(
                    operation = operation.as_str(),
                    order_id = %committed.order_id,
                    actor_id = %actor.id,
                    role = %actor.role,
                    "order lifecycle operation committed"
                );

                self.audit
                    .record(AuditEntry::new(
                        actor,
                        operation.as_str(),
                        Some(committed.order_id.clone()),
                        AuditOutcome::Success,
                        describe(&committed.event),
                    ))
                    .await;

                let _ = self.events_tx.send(OrderEvent {
                    order_id: committed.order_id,
                    customer_id: committed.customer_id,
                    assignee: committed.assignee,
                    actor: actor.clone(),
                    kind: committed.event,
                    at: Utc::now(),
                });

                Ok(committed.value)
            }
            Err(err) => {
                self.metrics
                    .observe_operation(operation.as_str(), err.kind(), elapsed);

                warn!(
                    operation = operation.as_str(),
                    order_id = ?order_id,
                    actor_id = %actor.id,
                    role = %actor.role,
                    error = %err,
                    "order lifecycle operation rejected"
                );

                self.audit
                    .record(AuditEntry::new(
                        actor,
                        operation.as_str(),
                        order_id.cloned(),
                        AuditOutcome::Failed,
                        err.to_string(),
                    ))
                    .await;

                Err(err)
            }
        }
    }
}

fn describe(event: &OrderEventKind) -> String {
    match event {
        OrderEventKind::Created => "order created".to_string(),
        OrderEventKind::DriverAssigned { driver_id } => format!("driver {driver_id} assigned"),
        OrderEventKind::StatusChanged { from, to } => format!("{from} -> {to}"),
        OrderEventKind::Edited => "order edited".to_string(),
        OrderEventKind::Deleted => "order deleted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{LifecycleManager, OrderFilter};
    use crate::engine::audit::AuditOutcome;
    use crate::error::LifecycleError;
    use crate::models::actor::{Actor, Role};
    use crate::models::driver::Driver;
    use crate::models::event::OrderEventKind;
    use crate::models::ids::{DriverId, OrderId};
    use crate::models::order::{NewOrder, OrderPatch, OrderStatus};
    use crate::observability::metrics::Metrics;
    use crate::store::memory::MemoryOrderStore;

    fn driver(id: &str) -> Driver {
        Driver {
            id: DriverId::from(id),
            fullname: format!("Driver {id}"),
            email: None,
            phone: None,
            vehicle_type: Some("van".to_string()),
            vehicle_number: None,
            license_number: None,
        }
    }

    fn setup() -> LifecycleManager {
        let store = MemoryOrderStore::new();
        store.upsert_driver(driver("D1"));
        store.upsert_driver(driver("D2"));
        LifecycleManager::new(Arc::new(store), Metrics::new(), 100, 16)
    }

    fn booking(pickup: &str) -> NewOrder {
        NewOrder {
            pickup_address: pickup.to_string(),
            delivery_address: "5 Oak Ave".to_string(),
            category: "Documents".to_string(),
            weight: 1.0,
            quantity: 1,
            amount: Some(25.50),
            ..NewOrder::default()
        }
    }

    fn customer() -> Actor {
        Actor::new("C1", Role::Customer)
    }

    fn staff() -> Actor {
        Actor::new("S1", Role::Staff)
    }

    fn d1() -> Actor {
        Actor::new("D1", Role::Driver)
    }

    #[tokio::test]
    async fn booking_to_delivery_scenario() {
        let manager = setup();

        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.driver_id, None);

        let order = manager
            .assign_driver(&order.id, &DriverId::from("D1"), &staff())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.driver_id, Some(DriverId::from("D1")));

        let order = manager
            .advance_status(&order.id, OrderStatus::PickedUp, &d1())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::PickedUp);

        let order = manager
            .advance_status(&order.id, OrderStatus::Delivered, &d1())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);

        let patch = OrderPatch {
            special_instructions: Some("leave at door".to_string()),
            ..OrderPatch::default()
        };
        let edit = manager.edit_order(&order.id, &patch, &staff()).await;
        assert!(matches!(edit, Err(LifecycleError::OrderLocked(_))));
    }

    #[tokio::test]
    async fn customer_cannot_assign() {
        let manager = setup();
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();

        let result = manager
            .assign_driver(&order.id, &DriverId::from("D1"), &customer())
            .await;
        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn busy_driver_cannot_take_second_order() {
        let manager = setup();
        let first = manager
            .create_order(booking("1 First St"), &customer())
            .await
            .unwrap();
        let second = manager
            .create_order(booking("2 Second St"), &customer())
            .await
            .unwrap();

        manager
            .assign_driver(&first.id, &DriverId::from("D1"), &staff())
            .await
            .unwrap();
        let result = manager
            .assign_driver(&second.id, &DriverId::from("D1"), &staff())
            .await;
        assert_eq!(result, Err(LifecycleError::DriverUnavailable(DriverId::from("D1"))));

        let reassigned = manager
            .assign_driver(&second.id, &DriverId::from("D2"), &staff())
            .await
            .unwrap();
        assert_eq!(reassigned.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn unknown_driver_is_a_validation_error() {
        let manager = setup();
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();

        let result = manager
            .assign_driver(&order.id, &DriverId::from("D404"), &staff())
            .await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
    }

    #[tokio::test]
    async fn cancelling_processing_order_releases_driver() {
        let manager = setup();
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        manager
            .assign_driver(&order.id, &DriverId::from("D1"), &staff())
            .await
            .unwrap();

        let cancelled = manager
            .advance_status(&order.id, OrderStatus::Cancelled, &staff())
            .await
            .unwrap();
        assert_eq!(cancelled.driver_id, None);
        assert!(manager
            .driver_availability(&DriverId::from("D1"), &staff())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn terminal_orders_stay_terminal() {
        let manager = setup();
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        manager
            .advance_status(&order.id, OrderStatus::Cancelled, &customer())
            .await
            .unwrap();

        for target in OrderStatus::ALL {
            let result = manager.advance_status(&order.id, target, &staff()).await;
            assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })));
        }
        let stored = manager.get_order(&order.id, &staff()).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let manager = setup();
        let result = manager
            .advance_status(&OrderId::from("missing"), OrderStatus::PickedUp, &staff())
            .await;
        assert!(matches!(result, Err(LifecycleError::NotFound(_))));
    }

    #[tokio::test]
    async fn reads_are_role_scoped() {
        let manager = setup();
        let mine = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        manager
            .create_order(booking("99 Other Rd"), &Actor::new("C2", Role::Customer))
            .await
            .unwrap();
        manager
            .assign_driver(&mine.id, &DriverId::from("D1"), &staff())
            .await
            .unwrap();

        let filter = OrderFilter::default();
        assert_eq!(manager.list_orders(&customer(), &filter).await.unwrap().len(), 1);
        assert_eq!(manager.list_orders(&d1(), &filter).await.unwrap().len(), 1);
        assert_eq!(manager.list_orders(&staff(), &filter).await.unwrap().len(), 2);

        let other_driver = Actor::new("D2", Role::Driver);
        let result = manager.get_order(&mine.id, &other_driver).await;
        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn search_and_status_filters_combine() {
        let manager = setup();
        manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        let oak = manager
            .create_order(booking("7 Harbour Way"), &customer())
            .await
            .unwrap();
        manager
            .advance_status(&oak.id, OrderStatus::Cancelled, &customer())
            .await
            .unwrap();

        let filter = OrderFilter {
            status: None,
            search: Some("harbour".to_string()),
        };
        assert_eq!(manager.list_orders(&staff(), &filter).await.unwrap().len(), 1);

        let filter = OrderFilter {
            status: Some(OrderStatus::Pending),
            search: Some("oak".to_string()),
        };
        let pending = manager.list_orders(&staff(), &filter).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].pickup_address, "12 Main St");

        let stats = manager.order_stats(&staff()).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.booked_amount, 25.5);
    }

    #[tokio::test]
    async fn drivers_listing_reports_derived_availability() {
        let manager = setup();
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        manager
            .assign_driver(&order.id, &DriverId::from("D2"), &staff())
            .await
            .unwrap();

        let drivers = manager.list_drivers(&staff()).await.unwrap();
        let availability: Vec<(String, bool)> = drivers
            .iter()
            .map(|view| (view.driver.id.to_string(), view.is_available))
            .collect();
        assert_eq!(
            availability,
            vec![("D1".to_string(), true), ("D2".to_string(), false)]
        );

        assert!(manager.list_drivers(&d1()).await.is_err());
        assert!(manager
            .driver_availability(&DriverId::from("D1"), &d1())
            .await
            .unwrap());
        assert!(manager
            .driver_availability(&DriverId::from("D2"), &d1())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn mutations_are_audited_and_published() {
        let manager = setup();
        let mut events = manager.subscribe();

        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        let _ = manager
            .assign_driver(&order.id, &DriverId::from("D1"), &customer())
            .await;

        let event = events.recv().await.unwrap();
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.kind, OrderEventKind::Created);
        assert!(events.try_recv().is_err());

        let admin = Actor::new("A1", Role::Admin);
        let entries = manager.audit_log(&admin).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "assign_driver");
        assert_eq!(entries[0].outcome, AuditOutcome::Failed);
        assert_eq!(entries[1].outcome, AuditOutcome::Success);

        assert!(manager.audit_log(&staff()).await.is_err());
    }

    #[tokio::test]
    async fn delete_requires_staff_tier() {
        let manager = setup();
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();

        let result = manager.delete_order(&order.id, &customer()).await;
        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));

        manager.delete_order(&order.id, &staff()).await.unwrap();
        let result = manager.get_order(&order.id, &staff()).await;
        assert!(matches!(result, Err(LifecycleError::NotFound(_))));
    }

    #[tokio::test]
    async fn events_name_the_customer_and_the_released_driver() {
        let manager = setup();
        let mut events = manager.subscribe();

        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();
        manager
            .assign_driver(&order.id, &DriverId::from("D1"), &staff())
            .await
            .unwrap();
        manager
            .advance_status(&order.id, OrderStatus::Cancelled, &staff())
            .await
            .unwrap();

        let created = events.recv().await.unwrap();
        assert_eq!(created.customer_id.as_str(), "C1");
        assert_eq!(created.assignee, None);

        let assigned = events.recv().await.unwrap();
        assert_eq!(assigned.assignee, Some(DriverId::from("D1")));

        let cancelled = events.recv().await.unwrap();
        assert_eq!(cancelled.assignee, Some(DriverId::from("D1")));
        assert!(cancelled.visible_to(&d1()));
        assert!(!cancelled.visible_to(&Actor::new("C2", Role::Customer)));
    }

    #[tokio::test]
    async fn staff_register_drivers_who_can_then_be_assigned() {
        let manager = LifecycleManager::new(Arc::new(MemoryOrderStore::new()), Metrics::new(), 100, 16);
        let order = manager
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();

        let result = manager
            .assign_driver(&order.id, &DriverId::from("D7"), &staff())
            .await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));

        let result = manager.register_driver(driver("D7"), &customer()).await;
        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));

        let mut blank = driver("D8");
        blank.fullname = "  ".to_string();
        let result = manager.register_driver(blank, &staff()).await;
        assert!(matches!(result, Err(LifecycleError::Validation(_))));

        let registered = manager.register_driver(driver(" D7 "), &staff()).await.unwrap();
        assert_eq!(registered.id, DriverId::from("D7"));

        let assigned = manager
            .assign_driver(&order.id, &DriverId::from("D7"), &staff())
            .await
            .unwrap();
        assert_eq!(assigned.status, OrderStatus::Processing);

        let admin = Actor::new("A1", Role::Admin);
        let entries = manager.audit_log(&admin).await.unwrap();
        assert!(entries.iter().any(|entry| entry.action == "register_driver"));
    }

    #[tokio::test]
    async fn session_handles_share_audit_and_events() {
        let manager = setup();
        let mut events = manager.subscribe();
        let scoped = manager.with_session("tok-c1");

        let order = scoped
            .create_order(booking("12 Main St"), &customer())
            .await
            .unwrap();

        assert_eq!(events.recv().await.unwrap().order_id, order.id);
        let admin = Actor::new("A1", Role::Admin);
        assert_eq!(manager.audit_log(&admin).await.unwrap().len(), 1);
        assert!(manager.get_order(&order.id, &staff()).await.is_ok());
    }
}
