use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::api::{AuthProvider, HttpTransport, Transport};
use crate::config::CoreConfig;
use crate::error::StoreError;
use crate::reconciler::PreferenceReconciler;
use crate::store::{CatalogStore, HookId, JsonFileStore, KeyValueStore, Persister};
use crate::sync::SyncGateway;

/// Owns the store and everything attached to it.
///
/// Construction does no I/O. Call `start` once inside a tokio runtime to
/// rehydrate persisted state and attach the background watchers, and
/// `shutdown` to detach them and wait for pending saves.
pub struct CoreRuntime {
    store: CatalogStore,
    persister: Persister,
    reconciler: PreferenceReconciler,
    gateway: SyncGateway,
    reconciler_hook: Mutex<Option<HookId>>,
}

impl CoreRuntime {
    /// Runtime talking HTTP to the configured endpoints and persisting into
    /// `config.data_dir`.
    pub fn new(config: CoreConfig, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = Arc::new(JsonFileStore::new(&config.data_dir));
        Ok(Self::with_collaborators(
            config,
            Arc::new(HttpTransport::new()),
            storage,
            auth,
        ))
    }

    pub fn with_collaborators(
        config: CoreConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let store = CatalogStore::new(config, transport);
        let gateway = SyncGateway::new(store.clone(), auth);
        let reconciler = PreferenceReconciler::new(store.clone(), gateway.clone());
        Self {
            store,
            persister: Persister::new(storage),
            reconciler,
            gateway,
            reconciler_hook: Mutex::new(None),
        }
    }

    /// Attach watchers and rehydrate. The reconciler sees the rehydrated
    /// liked set and starts loading whatever is missing.
    pub async fn start(&self) {
        self.persister.attach(&self.store);
        {
            let mut hook = self.reconciler_hook.lock();
            if hook.is_none() {
                *hook = Some(self.reconciler.attach());
            }
        }
        self.persister.rehydrate(&self.store).await;
    }

    /// Detach the runtime's own watchers, wait for queued saves, then write
    /// every field once more. Hooks registered through
    /// `CatalogStore::subscribe` stay in place.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        if let Some(id) = self.reconciler_hook.lock().take() {
            self.store.unsubscribe(id);
        }
        self.persister.detach(&self.store);
        self.persister.drain().await;
        if self.store.is_rehydrated() {
            self.persister.flush(&self.store).await?;
        }
        tracing::info!("runtime shut down");
        Ok(())
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn reconciler(&self) -> &PreferenceReconciler {
        &self.reconciler
    }

    pub fn gateway(&self) -> &SyncGateway {
        &self.gateway
    }

    // ===== Convenience actions =====

    pub async fn toggle_like(&self, id: u64) -> bool {
        self.reconciler.toggle(id).await
    }

    pub async fn set_comment(&self, id: u64, text: Option<&str>) -> Result<(), StoreError> {
        self.gateway.set_annotation(id, text).await
    }
}
