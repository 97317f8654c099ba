use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{info, instrument};

use crate::identity::{Credentials, IdentityError, IdentityProvider, LoginResponse};
use crate::models::actor::Role;

/// Client for the remote `POST /login/{role}` endpoint.
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| IdentityError::Upstream(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip(self, credentials), fields(role = %role))]
    async fn login(
        &self,
        role: Role,
        credentials: &Credentials,
    ) -> Result<LoginResponse, IdentityError> {
        let url = format!("{}/login/{}", self.base_url, role);
        let response = self
            .client
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(|err| IdentityError::Upstream(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                return Err(IdentityError::InvalidCredentials);
            }
            status => return Err(IdentityError::Upstream(format!("http {status}"))),
        }

        let login = response
            .json::<LoginResponse>()
            .await
            .map_err(|err| IdentityError::Upstream(format!("malformed login response: {err}")))?;

        if login.role != role {
            return Err(IdentityError::RoleMismatch {
                requested: role,
                returned: login.role,
            });
        }

        info!(user_id = %login.user.id, "login accepted by identity provider");
        Ok(login)
    }
}
