//! Role authorization matrix for order operations.

use crate::error::LifecycleError;
use crate::models::actor::{Actor, Role};
use crate::models::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CreateOrder,
    AssignDriver,
    EditAnyOrder,
    EditOwnOrder,
    DeleteOrder,
    ReadAllOrders,
    ViewDrivers,
    ManageDrivers,
    ViewDirectory,
    ViewAudit,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::CreateOrder => "create orders",
            Permission::AssignDriver => "assign drivers",
            Permission::EditAnyOrder => "edit any order",
            Permission::EditOwnOrder => "edit own orders",
            Permission::DeleteOrder => "delete orders",
            Permission::ReadAllOrders => "read all orders",
            Permission::ViewDrivers => "view drivers",
            Permission::ManageDrivers => "manage drivers",
            Permission::ViewDirectory => "view directories",
            Permission::ViewAudit => "view the audit log",
        }
    }
}

pub fn allows(role: Role, permission: Permission) -> bool {
    use Permission::*;
    use Role::*;

    match (role, permission) {
        (Customer, CreateOrder | EditOwnOrder) => true,
        (Customer, _) => false,
        (Driver, _) => false,
        (Staff, ViewAudit) => false,
        (Staff, EditOwnOrder) => false,
        (Staff, _) => true,
        (Admin | Superadmin, EditOwnOrder) => false,
        (Admin | Superadmin, _) => true,
    }
}

pub fn authorize(actor: &Actor, permission: Permission) -> Result<(), LifecycleError> {
    if allows(actor.role, permission) {
        Ok(())
    } else {
        Err(LifecycleError::Unauthorized(format!(
            "{} may not {}",
            actor.role,
            permission.as_str()
        )))
    }
}

/// Role-scoped visibility: customers see their own orders, drivers the ones
/// assigned to them, the staff tier everything.
pub fn can_view(actor: &Actor, order: &Order) -> bool {
    match actor.role {
        Role::Customer => actor.is_customer(&order.customer_id),
        Role::Driver => actor.is_driver(order.driver_id.as_ref()),
        _ => allows(actor.role, Permission::ReadAllOrders),
    }
}

#[cfg(test)]
mod tests {
    use super::{allows, authorize, Permission};
    use crate::error::LifecycleError;
    use crate::models::actor::{Actor, Role};

    #[test]
    fn drivers_hold_no_back_office_permissions() {
        for permission in [
            Permission::CreateOrder,
            Permission::AssignDriver,
            Permission::EditAnyOrder,
            Permission::EditOwnOrder,
            Permission::DeleteOrder,
            Permission::ReadAllOrders,
            Permission::ViewDrivers,
            Permission::ManageDrivers,
            Permission::ViewDirectory,
            Permission::ViewAudit,
        ] {
            assert!(!allows(Role::Driver, permission), "{permission:?}");
        }
    }

    #[test]
    fn only_staff_tier_assigns_deletes_and_manages_drivers() {
        for role in Role::ALL {
            assert_eq!(allows(role, Permission::AssignDriver), role.is_staff_tier());
            assert_eq!(allows(role, Permission::DeleteOrder), role.is_staff_tier());
            assert_eq!(allows(role, Permission::ManageDrivers), role.is_staff_tier());
        }
    }

    #[test]
    fn audit_log_is_admin_only() {
        assert!(!allows(Role::Staff, Permission::ViewAudit));
        assert!(allows(Role::Admin, Permission::ViewAudit));
        assert!(allows(Role::Superadmin, Permission::ViewAudit));
    }

    #[test]
    fn customer_assignment_is_unauthorized() {
        let customer = Actor::new("C1", Role::Customer);
        let result = authorize(&customer, Permission::AssignDriver);
        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));
    }
}
