use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ids::{CustomerId, DriverId, OrderId};

/// Canonical order status. Legacy spellings used by older clients are mapped
/// on the way in; output is always the canonical snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::PickedUp,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses in which the assigned driver is considered busy.
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::PickedUp)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" | "assigned" => Ok(OrderStatus::Processing),
            "picked_up" | "in_transit" => Ok(OrderStatus::PickedUp),
            "delivered" | "completed" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("unknown order status: {raw}")),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub category: String,
    pub weight: f64,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub delivery_type: Option<String>,
    #[serde(default)]
    pub insured: bool,
    pub amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking payload as submitted by a customer or entered by staff.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewOrder {
    /// Required when staff book on behalf of a customer; ignored otherwise
    /// unless it names somebody else.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub category: String,
    pub weight: f64,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub delivery_type: Option<String>,
    #[serde(default)]
    pub insured: bool,
    /// Priced with the booking estimator when omitted.
    #[serde(default)]
    pub amount: Option<f64>,
}

/// A validated order that has not been persisted yet. The store assigns the
/// id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_id: CustomerId,
    pub pickup_address: String,
    pub delivery_address: String,
    pub category: String,
    pub weight: f64,
    pub quantity: u32,
    pub special_instructions: Option<String>,
    pub delivery_type: Option<String>,
    pub insured: bool,
    pub amount: f64,
    pub status: OrderStatus,
    pub driver_id: Option<DriverId>,
}

/// Editable order fields. Status, driver and owner are not editable;
/// they only change through the lifecycle operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_type: Option<String>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        *self == OrderPatch::default()
    }

    pub fn apply_to(&self, order: &mut Order) {
        if let Some(value) = &self.pickup_address {
            order.pickup_address = value.clone();
        }
        if let Some(value) = &self.delivery_address {
            order.delivery_address = value.clone();
        }
        if let Some(value) = &self.category {
            order.category = value.clone();
        }
        if let Some(value) = self.weight {
            order.weight = value;
        }
        if let Some(value) = self.quantity {
            order.quantity = value;
        }
        if let Some(value) = self.amount {
            order.amount = value;
        }
        if let Some(value) = &self.special_instructions {
            order.special_instructions = Some(value.clone());
        }
        if let Some(value) = &self.delivery_type {
            order.delivery_type = Some(value.clone());
        }
    }
}
