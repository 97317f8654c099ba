use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ids::DriverId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub fullname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
}

/// A driver together with availability derived from the current orders.
#[derive(Debug, Clone, Serialize)]
pub struct DriverView {
    #[serde(flatten)]
    pub driver: Driver,
    pub is_available: bool,
}

/// Entry of the customer, staff or admin directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub fullname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directory {
    Customers,
    Staff,
    Admin,
}

impl Directory {
    pub fn path(self) -> &'static str {
        match self {
            Directory::Customers => "customers",
            Directory::Staff => "staff",
            Directory::Admin => "admin",
        }
    }
}

impl FromStr for Directory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        [Directory::Customers, Directory::Staff, Directory::Admin]
            .into_iter()
            .find(|directory| directory.path().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown directory: {raw}"))
    }
}
