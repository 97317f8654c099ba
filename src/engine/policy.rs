//! Pure decision functions for every order mutation.
//!
//! Each `plan_*` function takes the order as last read from the store and
//! either rejects the request or returns the guarded update that the store
//! must apply. Nothing here performs I/O.

use crate::engine::availability::compute_driver_availability;
use crate::engine::permissions::{authorize, Permission};
use crate::engine::pricing::estimate_price;
use crate::engine::transitions::{rule, Allowed, Trigger};
use crate::error::LifecycleError;
use crate::models::actor::{Actor, Role};
use crate::models::event::OrderEventKind;
use crate::models::ids::{CustomerId, DriverId};
use crate::models::order::{NewOrder, Order, OrderDraft, OrderPatch, OrderStatus};
use crate::store::{OrderUpdate, UpdateGuard};

/// A checked mutation, ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub guard: UpdateGuard,
    pub update: OrderUpdate,
    pub event: OrderEventKind,
}

pub fn plan_create(payload: NewOrder, actor: &Actor) -> Result<OrderDraft, LifecycleError> {
    authorize(actor, Permission::CreateOrder)?;

    let customer_id = match actor.role {
        Role::Customer => match payload.customer_id {
            Some(requested) if requested.as_str() != actor.id => {
                return Err(LifecycleError::Unauthorized(
                    "customers may only book for themselves".to_string(),
                ));
            }
            _ => CustomerId::new(actor.id.clone()),
        },
        _ => {
            let customer_id = payload.customer_id.ok_or_else(|| {
                LifecycleError::Validation("customer_id is required".to_string())
            })?;
            require_text("customer_id", customer_id.as_str())?;
            customer_id
        }
    };

    let weight = require_positive("weight", payload.weight)?;
    let amount = match payload.amount {
        Some(amount) => require_positive("amount", amount)?,
        None => estimate_price(weight, payload.insured)?,
    };

    Ok(OrderDraft {
        customer_id,
        pickup_address: require_text("pickup_address", &payload.pickup_address)?,
        delivery_address: require_text("delivery_address", &payload.delivery_address)?,
        category: require_text("category", &payload.category)?,
        weight,
        quantity: require_quantity(payload.quantity)?,
        special_instructions: optional_text(payload.special_instructions),
        delivery_type: optional_text(payload.delivery_type),
        insured: payload.insured,
        amount,
        status: OrderStatus::Pending,
        driver_id: None,
    })
}

pub fn plan_assignment(
    order: &Order,
    driver_id: &DriverId,
    actor: &Actor,
    all_orders: &[Order],
) -> Result<Plan, LifecycleError> {
    authorize(actor, Permission::AssignDriver)?;

    if order.status != OrderStatus::Pending || order.driver_id.is_some() {
        return Err(LifecycleError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Processing,
        });
    }

    if !compute_driver_availability(driver_id, all_orders) {
        return Err(LifecycleError::DriverUnavailable(driver_id.clone()));
    }

    Ok(Plan {
        guard: UpdateGuard::for_order(order).reserving(driver_id.clone()),
        update: OrderUpdate {
            status: Some(OrderStatus::Processing),
            driver_id: Some(Some(driver_id.clone())),
            ..OrderUpdate::default()
        },
        event: OrderEventKind::DriverAssigned {
            driver_id: driver_id.clone(),
        },
    })
}

pub fn plan_transition(
    order: &Order,
    target: OrderStatus,
    actor: &Actor,
) -> Result<Plan, LifecycleError> {
    let invalid = LifecycleError::InvalidTransition {
        from: order.status,
        to: target,
    };

    if order.status.is_terminal() {
        return Err(invalid);
    }

    // Entering `processing` is only possible through driver assignment.
    let edge = match rule(order.status, target) {
        Some(edge) if edge.trigger != Trigger::Assignment => edge,
        _ => return Err(invalid),
    };

    let permitted = actor.role.is_staff_tier()
        || match edge.allowed {
            Allowed::Staff => false,
            Allowed::OwnerOrStaff => actor.is_customer(&order.customer_id),
            Allowed::AssignedDriverOrStaff => actor.is_driver(order.driver_id.as_ref()),
        };

    if !permitted {
        return Err(LifecycleError::Unauthorized(format!(
            "{} may not move order {} from {} to {}",
            actor.role, order.id, order.status, target
        )));
    }

    Ok(Plan {
        guard: UpdateGuard::for_order(order),
        update: OrderUpdate {
            status: Some(target),
            driver_id: edge.releases_driver.then_some(None),
            ..OrderUpdate::default()
        },
        event: OrderEventKind::StatusChanged {
            from: order.status,
            to: target,
        },
    })
}

pub fn plan_edit(order: &Order, patch: &OrderPatch, actor: &Actor) -> Result<Plan, LifecycleError> {
    match actor.role {
        Role::Customer => {
            authorize(actor, Permission::EditOwnOrder)?;
            if !actor.is_customer(&order.customer_id) {
                return Err(LifecycleError::Unauthorized(
                    "customers may only edit their own orders".to_string(),
                ));
            }
            if patch.amount.is_some() {
                return Err(LifecycleError::Unauthorized(
                    "customers may not change the amount".to_string(),
                ));
            }
            if order.status != OrderStatus::Pending {
                return Err(LifecycleError::OrderLocked(format!(
                    "order {} is {} and can no longer be edited by the customer",
                    order.id, order.status
                )));
            }
        }
        _ => {
            authorize(actor, Permission::EditAnyOrder)?;
            if order.status.is_terminal() {
                return Err(LifecycleError::OrderLocked(format!(
                    "order {} is {}",
                    order.id, order.status
                )));
            }
        }
    }

    if patch.is_empty() {
        return Err(LifecycleError::Validation(
            "no editable fields supplied".to_string(),
        ));
    }

    let fields = OrderPatch {
        pickup_address: patch
            .pickup_address
            .as_deref()
            .map(|value| require_text("pickup_address", value))
            .transpose()?,
        delivery_address: patch
            .delivery_address
            .as_deref()
            .map(|value| require_text("delivery_address", value))
            .transpose()?,
        category: patch
            .category
            .as_deref()
            .map(|value| require_text("category", value))
            .transpose()?,
        weight: patch
            .weight
            .map(|value| require_positive("weight", value))
            .transpose()?,
        quantity: patch.quantity.map(require_quantity).transpose()?,
        amount: patch
            .amount
            .map(|value| require_positive("amount", value))
            .transpose()?,
        special_instructions: patch
            .special_instructions
            .as_ref()
            .map(|value| value.trim().to_string()),
        delivery_type: patch
            .delivery_type
            .as_ref()
            .map(|value| value.trim().to_string()),
    };

    Ok(Plan {
        guard: UpdateGuard::for_order(order),
        update: OrderUpdate {
            fields,
            ..OrderUpdate::default()
        },
        event: OrderEventKind::Edited,
    })
}

pub fn check_delete(actor: &Actor) -> Result<(), LifecycleError> {
    authorize(actor, Permission::DeleteOrder)
}

fn require_text(field: &str, value: &str) -> Result<String, LifecycleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn require_positive(field: &str, value: f64) -> Result<f64, LifecycleError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LifecycleError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(value)
}

fn require_quantity(quantity: u32) -> Result<u32, LifecycleError> {
    if quantity == 0 {
        return Err(LifecycleError::Validation(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(quantity)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{check_delete, plan_assignment, plan_create, plan_edit, plan_transition};
    use crate::engine::availability::tests::order;
    use crate::error::LifecycleError;
    use crate::models::actor::{Actor, Role};
    use crate::models::event::OrderEventKind;
    use crate::models::ids::{CustomerId, DriverId};
    use crate::models::order::{NewOrder, OrderPatch, OrderStatus};

    fn booking() -> NewOrder {
        NewOrder {
            customer_id: None,
            pickup_address: "12 Main St".to_string(),
            delivery_address: "5 Oak Ave".to_string(),
            category: "Documents".to_string(),
            weight: 2.0,
            quantity: 1,
            amount: Some(25.5),
            ..NewOrder::default()
        }
    }

    fn customer() -> Actor {
        Actor::new("C1", Role::Customer)
    }

    fn staff() -> Actor {
        Actor::new("S1", Role::Staff)
    }

    fn driver(id: &str) -> Actor {
        Actor::new(id, Role::Driver)
    }

    #[test]
    fn customer_booking_is_pending_without_driver() {
        let draft = plan_create(booking(), &customer()).unwrap();

        assert_eq!(draft.status, OrderStatus::Pending);
        assert_eq!(draft.driver_id, None);
        assert_eq!(draft.customer_id, CustomerId::from("C1"));
        assert_eq!(draft.amount, 25.5);
    }

    #[test]
    fn booking_rejects_bad_amounts_and_blank_addresses() {
        for amount in [0.0, -3.0, f64::INFINITY] {
            let payload = NewOrder {
                amount: Some(amount),
                ..booking()
            };
            assert!(matches!(
                plan_create(payload, &customer()),
                Err(LifecycleError::Validation(_))
            ));
        }

        let payload = NewOrder {
            delivery_address: "   ".to_string(),
            ..booking()
        };
        assert!(matches!(
            plan_create(payload, &customer()),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn booking_without_amount_uses_estimate() {
        let payload = NewOrder {
            amount: None,
            weight: 4.0,
            insured: true,
            ..booking()
        };
        let draft = plan_create(payload, &customer()).unwrap();
        assert_eq!(draft.amount, 30.0);
    }

    #[test]
    fn staff_must_name_the_customer() {
        let missing = plan_create(booking(), &staff());
        assert!(matches!(missing, Err(LifecycleError::Validation(_))));

        let payload = NewOrder {
            customer_id: Some(CustomerId::from("C9")),
            ..booking()
        };
        let draft = plan_create(payload, &staff()).unwrap();
        assert_eq!(draft.customer_id, CustomerId::from("C9"));
    }

    #[test]
    fn customers_cannot_book_for_others_and_drivers_cannot_book() {
        let payload = NewOrder {
            customer_id: Some(CustomerId::from("C2")),
            ..booking()
        };
        assert!(matches!(
            plan_create(payload, &customer()),
            Err(LifecycleError::Unauthorized(_))
        ));
        assert!(matches!(
            plan_create(booking(), &driver("D1")),
            Err(LifecycleError::Unauthorized(_))
        ));
    }

    #[test]
    fn assignment_moves_pending_order_to_processing() {
        let pending = order("O1", OrderStatus::Pending, None);
        let plan = plan_assignment(&pending, &DriverId::from("D1"), &staff(), &[]).unwrap();

        assert_eq!(plan.update.status, Some(OrderStatus::Processing));
        assert_eq!(plan.update.driver_id, Some(Some(DriverId::from("D1"))));
        assert_eq!(plan.guard.reserve_driver, Some(DriverId::from("D1")));
        assert_eq!(plan.guard.expected_status, OrderStatus::Pending);
    }

    #[test]
    fn assignment_rejects_busy_driver() {
        let pending = order("O1", OrderStatus::Pending, None);
        let busy = vec![order("O2", OrderStatus::PickedUp, Some("D1"))];

        let result = plan_assignment(&pending, &DriverId::from("D1"), &staff(), &busy);
        assert_eq!(result, Err(LifecycleError::DriverUnavailable(DriverId::from("D1"))));
    }

    #[test]
    fn assignment_requires_staff_tier_and_pending_status() {
        let pending = order("O1", OrderStatus::Pending, None);
        let result = plan_assignment(&pending, &DriverId::from("D1"), &customer(), &[]);
        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));

        let superadmin = Actor::new("root", Role::Superadmin);
        assert!(plan_assignment(&pending, &DriverId::from("D1"), &superadmin, &[]).is_ok());

        let processing = order("O1", OrderStatus::Processing, Some("D2"));
        let result = plan_assignment(&processing, &DriverId::from("D1"), &staff(), &[]);
        assert_eq!(
            result,
            Err(LifecycleError::InvalidTransition {
                from: OrderStatus::Processing,
                to: OrderStatus::Processing,
            })
        );
    }

    #[test]
    fn assigned_driver_advances_their_own_order() {
        let processing = order("O1", OrderStatus::Processing, Some("D1"));
        let plan = plan_transition(&processing, OrderStatus::PickedUp, &driver("D1")).unwrap();
        assert_eq!(plan.update.status, Some(OrderStatus::PickedUp));
        assert_eq!(plan.update.driver_id, None);

        let other = plan_transition(&processing, OrderStatus::PickedUp, &driver("D2"));
        assert!(matches!(other, Err(LifecycleError::Unauthorized(_))));
    }

    #[test]
    fn staff_may_override_driver_steps() {
        let picked_up = order("O1", OrderStatus::PickedUp, Some("D1"));
        let plan = plan_transition(&picked_up, OrderStatus::Delivered, &staff()).unwrap();
        assert_eq!(
            plan.event,
            OrderEventKind::StatusChanged {
                from: OrderStatus::PickedUp,
                to: OrderStatus::Delivered,
            }
        );
    }

    #[test]
    fn cancelling_an_assigned_order_clears_the_driver() {
        for status in [OrderStatus::Processing, OrderStatus::PickedUp] {
            let active = order("O1", status, Some("D1"));
            let plan = plan_transition(&active, OrderStatus::Cancelled, &staff()).unwrap();
            assert_eq!(plan.update.driver_id, Some(None), "{status}");
        }
    }

    #[test]
    fn only_owner_or_staff_cancel_pending_orders() {
        let pending = order("O1", OrderStatus::Pending, None);

        assert!(plan_transition(&pending, OrderStatus::Cancelled, &customer()).is_ok());
        assert!(matches!(
            plan_transition(&pending, OrderStatus::Cancelled, &Actor::new("C2", Role::Customer)),
            Err(LifecycleError::Unauthorized(_))
        ));

        let processing = order("O1", OrderStatus::Processing, Some("D1"));
        assert!(matches!(
            plan_transition(&processing, OrderStatus::Cancelled, &driver("D1")),
            Err(LifecycleError::Unauthorized(_))
        ));
    }

    #[test]
    fn terminal_orders_reject_every_target() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            let done = order("O1", terminal, None);
            for target in OrderStatus::ALL {
                let result = plan_transition(&done, target, &staff());
                assert_eq!(
                    result,
                    Err(LifecycleError::InvalidTransition {
                        from: terminal,
                        to: target,
                    })
                );
            }
        }
    }

    #[test]
    fn backward_and_skipping_moves_are_invalid() {
        let picked_up = order("O1", OrderStatus::PickedUp, Some("D1"));
        assert!(matches!(
            plan_transition(&picked_up, OrderStatus::Processing, &staff()),
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let pending = order("O1", OrderStatus::Pending, None);
        assert!(matches!(
            plan_transition(&pending, OrderStatus::Processing, &staff()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            plan_transition(&pending, OrderStatus::Delivered, &staff()),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn staff_edits_until_terminal() {
        let processing = order("O1", OrderStatus::Processing, Some("D1"));
        let patch = OrderPatch {
            amount: Some(40.0),
            delivery_address: Some("  9 Elm Rd ".to_string()),
            ..OrderPatch::default()
        };

        let plan = plan_edit(&processing, &patch, &staff()).unwrap();
        assert_eq!(plan.update.fields.amount, Some(40.0));
        assert_eq!(plan.update.fields.delivery_address.as_deref(), Some("9 Elm Rd"));
        assert_eq!(plan.update.status, None);

        let delivered = order("O1", OrderStatus::Delivered, Some("D1"));
        assert!(matches!(
            plan_edit(&delivered, &patch, &staff()),
            Err(LifecycleError::OrderLocked(_))
        ));
    }

    #[test]
    fn customer_edits_are_limited() {
        let pending = order("O1", OrderStatus::Pending, None);
        let note = OrderPatch {
            special_instructions: Some("ring twice".to_string()),
            ..OrderPatch::default()
        };
        assert!(plan_edit(&pending, &note, &customer()).is_ok());

        let reprice = OrderPatch {
            amount: Some(1.0),
            ..OrderPatch::default()
        };
        assert!(matches!(
            plan_edit(&pending, &reprice, &customer()),
            Err(LifecycleError::Unauthorized(_))
        ));

        let stranger = Actor::new("C2", Role::Customer);
        assert!(matches!(
            plan_edit(&pending, &note, &stranger),
            Err(LifecycleError::Unauthorized(_))
        ));

        let processing = order("O1", OrderStatus::Processing, Some("D1"));
        assert!(matches!(
            plan_edit(&processing, &note, &customer()),
            Err(LifecycleError::OrderLocked(_))
        ));
    }

    #[test]
    fn drivers_never_edit_and_empty_patches_fail() {
        let processing = order("O1", OrderStatus::Processing, Some("D1"));
        let patch = OrderPatch {
            amount: Some(99.0),
            ..OrderPatch::default()
        };
        assert!(matches!(
            plan_edit(&processing, &patch, &driver("D1")),
            Err(LifecycleError::Unauthorized(_))
        ));
        assert!(matches!(
            plan_edit(&processing, &OrderPatch::default(), &staff()),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn delete_is_staff_tier_only() {
        assert!(check_delete(&staff()).is_ok());
        assert!(check_delete(&Actor::new("A1", Role::Admin)).is_ok());
        assert!(check_delete(&customer()).is_err());
        assert!(check_delete(&driver("D1")).is_err());
    }
}
