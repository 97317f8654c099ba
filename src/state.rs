use std::sync::Arc;

use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::engine::lifecycle::LifecycleManager;
use crate::error::AppError;
use crate::identity::http::HttpIdentityProvider;
use crate::identity::sessions::SessionRegistry;
use crate::identity::IdentityProvider;
use crate::observability::metrics::Metrics;
use crate::store::http::HttpOrderStore;
use crate::store::memory::MemoryOrderStore;
use crate::store::OrderStore;

pub struct AppState {
    pub manager: LifecycleManager,
    pub sessions: SessionRegistry,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        identity: Option<Arc<dyn IdentityProvider>>,
        audit_capacity: usize,
        event_buffer_size: usize,
    ) -> Self {
        let metrics = Metrics::new();
        let manager =
            LifecycleManager::new(store, metrics.clone(), audit_capacity, event_buffer_size);

        Self {
            manager,
            sessions: SessionRegistry::default(),
            identity,
            metrics,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store: Arc<dyn OrderStore> = match config.store_backend {
            StoreBackend::Memory => {
                info!("using in-memory order store");
                Arc::new(MemoryOrderStore::new())
            }
            StoreBackend::Http => {
                let url = config.order_store_url.as_deref().ok_or_else(|| {
                    AppError::Config("STORE_BACKEND=http requires ORDER_STORE_URL".to_string())
                })?;
                let mut store = HttpOrderStore::new(url, config.upstream_timeout)
                    .map_err(|err| AppError::Config(err.to_string()))?;
                if let Some(token) = &config.order_store_token {
                    store = store.with_token(token.clone());
                }
                info!(url = %url, "using remote order store");
                Arc::new(store)
            }
        };

        let identity: Option<Arc<dyn IdentityProvider>> = match &config.identity_url {
            Some(url) => {
                let provider = HttpIdentityProvider::new(url.clone(), config.upstream_timeout)
                    .map_err(|err| AppError::Config(err.to_string()))?;
                Some(Arc::new(provider))
            }
            None => None,
        };

        let mut state = Self::new(
            store,
            identity,
            config.audit_capacity,
            config.event_buffer_size,
        );
        state.sessions = SessionRegistry::new(config.session_idle_timeout);
        Ok(state)
    }

    /// Drops idle sessions and refreshes the session gauge.
    pub fn sweep_sessions(&self) -> usize {
        let removed = self.sessions.sweep();
        self.metrics.active_sessions.set(self.sessions.len() as i64);
        removed
    }
}
