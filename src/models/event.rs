use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::actor::Actor;
use crate::models::ids::{CustomerId, DriverId, OrderId};
use crate::models::order::OrderStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    DriverAssigned { driver_id: DriverId },
    StatusChanged { from: OrderStatus, to: OrderStatus },
    Edited,
    Deleted,
}

/// Published on the event channel after every successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    /// Driver attached to the order when the event happened. A cancellation
    /// still names the driver it released.
    pub assignee: Option<DriverId>,
    pub actor: Actor,
    #[serde(flatten)]
    pub kind: OrderEventKind,
    pub at: DateTime<Utc>,
}

impl OrderEvent {
    /// Same scoping as order reads: staff tier sees everything, customers
    /// their own orders, drivers the orders they hold or held.
    pub fn visible_to(&self, viewer: &Actor) -> bool {
        viewer.role.is_staff_tier()
            || viewer.is_customer(&self.customer_id)
            || viewer.is_driver(self.assignee.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{OrderEvent, OrderEventKind};
    use crate::models::actor::{Actor, Role};
    use crate::models::ids::{CustomerId, DriverId, OrderId};

    fn event(assignee: Option<&str>) -> OrderEvent {
        OrderEvent {
            order_id: OrderId::from("O1"),
            customer_id: CustomerId::from("C1"),
            assignee: assignee.map(DriverId::from),
            actor: Actor::new("S1", Role::Staff),
            kind: OrderEventKind::Edited,
            at: Utc::now(),
        }
    }

    #[test]
    fn customers_only_see_their_own_orders() {
        let event = event(None);
        assert!(event.visible_to(&Actor::new("C1", Role::Customer)));
        assert!(!event.visible_to(&Actor::new("C2", Role::Customer)));
    }

    #[test]
    fn drivers_only_see_orders_they_hold() {
        assert!(event(Some("D1")).visible_to(&Actor::new("D1", Role::Driver)));
        assert!(!event(Some("D1")).visible_to(&Actor::new("D2", Role::Driver)));
        assert!(!event(None).visible_to(&Actor::new("D1", Role::Driver)));
    }

    #[test]
    fn staff_tier_sees_everything() {
        for role in [Role::Staff, Role::Admin, Role::Superadmin] {
            assert!(event(None).visible_to(&Actor::new("X", role)));
        }
    }

    #[test]
    fn matching_id_with_the_wrong_role_sees_nothing() {
        assert!(!event(None).visible_to(&Actor::new("C1", Role::Driver)));
    }
}
