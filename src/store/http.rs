//! Order store backed by the remote REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::models::driver::{Directory, Driver, Person};
use crate::models::ids::OrderId;
use crate::models::order::{Order, OrderDraft};
use crate::store::{OrderStore, OrderUpdate, StoreError, UpdateGuard};

pub struct HttpOrderStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// The API answers list endpoints either with a bare array or wrapped in a
/// `data` envelope, and single records either bare or enveloped too.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

#[derive(Serialize)]
struct GuardedUpdate<'a> {
    #[serde(flatten)]
    update: &'a OrderUpdate,
    #[serde(flatten)]
    guard: &'a UpdateGuard,
}

impl HttpOrderStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Backend(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Service token, used for calls made outside a user session.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| StoreError::Backend(format!("{what}: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, body = %body, "order store rejected request");

        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(what.to_string()),
            StatusCode::CONFLICT => StoreError::Conflict(if body.is_empty() {
                format!("{what}: conflicting update")
            } else {
                body
            }),
            _ => StoreError::Backend(format!("{what}: http {status}")),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json::<Envelope<T>>()
            .await
            .map(Envelope::into_inner)
            .map_err(|err| StoreError::Serialization(err.to_string()))
    }
}

#[async_trait]
impl OrderStore for HttpOrderStore {
    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let response = self.send(self.client.get(self.url("orders")), "orders").await?;
        Self::decode(response).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn get_order(&self, id: &OrderId) -> Result<Order, StoreError> {
        let what = format!("order {id}");
        let response = self
            .send(self.client.get(self.url(&format!("orders/{id}"))), &what)
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, draft))]
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let response = self
            .send(self.client.post(self.url("orders")).json(&draft), "orders")
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, guard, update), fields(order_id = %id))]
    async fn update_order(
        &self,
        id: &OrderId,
        guard: &UpdateGuard,
        update: &OrderUpdate,
    ) -> Result<Order, StoreError> {
        let what = format!("order {id}");
        let body = GuardedUpdate { update, guard };
        let result = self
            .send(
                self.client.put(self.url(&format!("orders/{id}"))).json(&body),
                &what,
            )
            .await;

        let response = match (result, &guard.reserve_driver) {
            (Err(StoreError::Conflict(msg)), Some(driver_id)) if msg.contains("driver") => {
                warn!(driver_id = %driver_id, "store refused driver reservation");
                return Err(StoreError::DriverBusy(driver_id.clone()));
            }
            (result, _) => result?,
        };

        Self::decode(response).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn delete_order(&self, id: &OrderId) -> Result<(), StoreError> {
        let what = format!("order {id}");
        self.send(self.client.delete(self.url(&format!("orders/{id}"))), &what)
            .await?;
        Ok(())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        let response = self.send(self.client.get(self.url("drivers")), "drivers").await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, driver), fields(driver_id = %driver.id))]
    async fn register_driver(&self, driver: Driver) -> Result<Driver, StoreError> {
        let response = self
            .send(self.client.post(self.url("drivers")).json(&driver), "drivers")
            .await?;
        Self::decode(response).await
    }

    async fn list_directory(&self, directory: Directory) -> Result<Vec<Person>, StoreError> {
        let response = self
            .send(self.client.get(self.url(directory.path())), directory.path())
            .await?;
        Self::decode(response).await
    }

    fn scoped(&self, token: &str) -> Option<Arc<dyn OrderStore>> {
        Some(Arc::new(Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        }))
    }
}
