//! Persistence boundary for orders and the role directories.
//!
//! The lifecycle manager holds no order state of its own; every read and
//! write goes through an [`OrderStore`]. Mutations are guarded updates: the
//! store applies them only if the order still looks the way the caller last
//! read it.

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::driver::{Directory, Driver, Person};
use crate::models::ids::{DriverId, OrderId};
use crate::models::order::{Order, OrderDraft, OrderPatch, OrderStatus};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// The guard no longer matches the stored order.
    #[error("{0}")]
    Conflict(String),

    /// The driver picked up another active order before this write landed.
    #[error("driver {0} is busy")]
    DriverBusy(DriverId),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Compare-and-set precondition for [`OrderStore::update_order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateGuard {
    pub expected_status: OrderStatus,
    pub expected_driver_id: Option<DriverId>,
    /// When set, the store must also verify that this driver holds no other
    /// active order, atomically with the write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_driver: Option<DriverId>,
}

impl UpdateGuard {
    pub fn for_order(order: &Order) -> Self {
        Self {
            expected_status: order.status,
            expected_driver_id: order.driver_id.clone(),
            reserve_driver: None,
        }
    }

    pub fn reserving(mut self, driver_id: DriverId) -> Self {
        self.reserve_driver = Some(driver_id);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        order.status == self.expected_status && order.driver_id == self.expected_driver_id
    }
}

/// Partial update applied by the store. `driver_id: Some(None)` clears the
/// driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub driver_id: Option<Option<DriverId>>,
    #[serde(flatten)]
    pub fields: OrderPatch,
}

impl OrderUpdate {
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(driver_id) = &self.driver_id {
            order.driver_id = driver_id.clone();
        }
        self.fields.apply_to(order);
    }
}

/// Distinguishes an explicit `null` from a missing field.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<DriverId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DriverId>::deserialize(deserializer).map(Some)
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError>;

    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError>;

    async fn update_order(
        &self,
        id: &OrderId,
        guard: &UpdateGuard,
        update: &OrderUpdate,
    ) -> Result<Order, StoreError>;

    async fn delete_order(&self, id: &OrderId) -> Result<(), StoreError>;

    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError>;

    /// Inserts the driver or replaces the profile stored under its id.
    async fn register_driver(&self, driver: Driver) -> Result<Driver, StoreError>;

    async fn list_directory(&self, directory: Directory) -> Result<Vec<Person>, StoreError>;

    /// A handle that authenticates as the given session. `None` when the
    /// backend has no per-caller credentials.
    fn scoped(&self, _token: &str) -> Option<Arc<dyn OrderStore>> {
        None
    }
}
