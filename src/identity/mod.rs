//! Authentication boundary.
//!
//! Login is delegated to an external identity provider. The service only
//! trusts roles that come back from that provider, recorded server-side in
//! the [`sessions::SessionRegistry`].

pub mod http;
pub mod sessions;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::actor::Role;

#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity provider returned role {returned}, expected {requested}")]
    RoleMismatch { requested: Role, returned: Role },

    #[error("no identity provider configured")]
    NotConfigured,

    #[error("identity provider error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub user: UserProfile,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, role: Role, credentials: &Credentials)
        -> Result<LoginResponse, IdentityError>;
}
