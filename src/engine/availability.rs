use crate::models::ids::DriverId;
use crate::models::order::Order;

/// A driver is available iff none of `orders` assigns them an order that is
/// `processing` or `picked_up`.
pub fn compute_driver_availability(driver_id: &DriverId, orders: &[Order]) -> bool {
    !orders
        .iter()
        .any(|order| order.status.is_active() && order.driver_id.as_ref() == Some(driver_id))
}
