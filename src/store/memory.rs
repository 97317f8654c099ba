//! In-memory order store.
//!
//! Reads go straight to the maps; writes are serialized behind one async
//! mutex so that a guard check (including the driver reservation scan) and the
//! write it protects happen atomically.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::availability::compute_driver_availability;
use crate::models::driver::{Directory, Driver, Person};
use crate::models::ids::{DriverId, OrderId};
use crate::models::order::{Order, OrderDraft};
use crate::store::{OrderStore, OrderUpdate, StoreError, UpdateGuard};

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<OrderId, Order>,
    drivers: DashMap<DriverId, Driver>,
    directories: DashMap<Directory, Vec<Person>>,
    write_lock: Mutex<()>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_driver(&self, driver: Driver) {
        self.drivers.insert(driver.id.clone(), driver);
    }

    pub fn add_person(&self, directory: Directory, person: Person) {
        self.directories.entry(directory).or_default().push(person);
    }

    fn snapshot(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.snapshot())
    }

    async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
        self.orders
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();

        let order = Order {
            id: OrderId::new(Uuid::new_v4().to_string()),
            customer_id: draft.customer_id,
            driver_id: draft.driver_id,
            pickup_address: draft.pickup_address,
            delivery_address: draft.delivery_address,
            category: draft.category,
            weight: draft.weight,
            quantity: draft.quantity,
            special_instructions: draft.special_instructions,
            delivery_type: draft.delivery_type,
            insured: draft.insured,
            amount: draft.amount,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };

        self.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn update_order(
        &self,
        id: &OrderId,
        guard: &UpdateGuard,
        update: &OrderUpdate,
    ) -> Result<Order, StoreError> {
        let _lock = self.write_lock.lock().await;

        let current = self.get_order(id).await?;
        if !guard.matches(&current) {
            return Err(StoreError::Conflict(format!(
                "order {id} changed concurrently (now {})",
                current.status
            )));
        }

        if let Some(driver_id) = &guard.reserve_driver {
            let others: Vec<Order> = self
                .snapshot()
                .into_iter()
                .filter(|order| &order.id != id)
                .collect();
            if !compute_driver_availability(driver_id, &others) {
                return Err(StoreError::DriverBusy(driver_id.clone()));
            }
        }

        let mut updated = current;
        update.apply_to(&mut updated);
        updated.updated_at = Utc::now();

        self.orders.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete_order(&self, id: &OrderId) -> Result<(), StoreError> {
        let _lock = self.write_lock.lock().await;
        self.orders
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(drivers)
    }

    async fn register_driver(&self, driver: Driver) -> Result<Driver, StoreError> {
        self.upsert_driver(driver.clone());
        Ok(driver)
    }

    async fn list_directory(&self, directory: Directory) -> Result<Vec<Person>, StoreError> {
        Ok(self
            .directories
            .get(&directory)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
