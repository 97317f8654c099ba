use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ids::{CustomerId, DriverId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Driver,
    Staff,
    Admin,
    Superadmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Customer,
        Role::Driver,
        Role::Staff,
        Role::Admin,
        Role::Superadmin,
    ];

    /// Staff, admin and superadmin share the back-office permissions.
    pub fn is_staff_tier(self) -> bool {
        matches!(self, Role::Staff | Role::Admin | Role::Superadmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Driver => "driver",
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown role: {raw}"))
    }
}

/// The caller of a lifecycle operation, as resolved from a verified session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_customer(&self, customer_id: &CustomerId) -> bool {
        self.role == Role::Customer && self.id == customer_id.as_str()
    }

    pub fn is_driver(&self, driver_id: Option<&DriverId>) -> bool {
        self.role == Role::Driver && driver_id.is_some_and(|id| id.as_str() == self.id)
    }
}
