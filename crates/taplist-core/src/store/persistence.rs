//! Durable mirror of selected store fields.
//!
//! Each persisted field has its own key and encoding strategy (list, scalar,
//! map or object), stored as JSON text in an opaque async key-value store.
//! `Persister::rehydrate` restores every field once at startup; afterwards a
//! hook queues a save whenever a persisted field changes. Saves are written
//! in order by a single background task.
//!
//! Nothing is saved before rehydration completes, so an empty pre-load state
//! can never overwrite what is on disk.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::constants::storage_keys;
use crate::error::StoreError;
use crate::models::{Beer, BeersInfo};
use crate::store::catalog_store::{CatalogStore, StoreState};
use crate::store::changes::{Changes, HookId, StoreChange};
use crate::store::merge::merge;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for {key}: {source}")]
    Decode {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("Failed to encode {key}: {source}")]
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Opaque durable key-value storage.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn save(&self, key: &str, value: String) -> Result<(), PersistenceError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write-to-temp-then-rename so a crash mid-write never leaves a torn file
    async fn save(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, value).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }
}

/// In-process storage, for embedders without a disk and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.values.lock().insert(key.to_string(), value.into());
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.insert(key, value);
        Ok(())
    }
}

/// A store field mirrored to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistedField {
    /// List strategy
    Beers,
    /// Scalar strategy
    RequestsRemaining,
    /// List strategy
    LikedBeerIds,
    /// Map strategy
    CommentsMap,
    /// Object strategy
    BeersInfo,
}

impl PersistedField {
    pub const ALL: [PersistedField; 5] = [
        PersistedField::Beers,
        PersistedField::RequestsRemaining,
        PersistedField::LikedBeerIds,
        PersistedField::CommentsMap,
        PersistedField::BeersInfo,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PersistedField::Beers => storage_keys::BEERS,
            PersistedField::RequestsRemaining => storage_keys::REQUESTS_REMAINING,
            PersistedField::LikedBeerIds => storage_keys::LIKED_BEER_IDS,
            PersistedField::CommentsMap => storage_keys::COMMENTS_MAP,
            PersistedField::BeersInfo => storage_keys::BEERS_INFO,
        }
    }

    pub fn for_change(change: StoreChange) -> Option<Self> {
        match change {
            StoreChange::Catalog => Some(PersistedField::Beers),
            StoreChange::Quota => Some(PersistedField::RequestsRemaining),
            StoreChange::LikedBeers => Some(PersistedField::LikedBeerIds),
            StoreChange::Comments => Some(PersistedField::CommentsMap),
            StoreChange::BeersInfo => Some(PersistedField::BeersInfo),
            _ => None,
        }
    }

    fn change(&self) -> StoreChange {
        match self {
            PersistedField::Beers => StoreChange::Catalog,
            PersistedField::RequestsRemaining => StoreChange::Quota,
            PersistedField::LikedBeerIds => StoreChange::LikedBeers,
            PersistedField::CommentsMap => StoreChange::Comments,
            PersistedField::BeersInfo => StoreChange::BeersInfo,
        }
    }

    pub(crate) fn encode(&self, state: &StoreState) -> Result<String, PersistenceError> {
        let encoded = match self {
            PersistedField::Beers => serde_json::to_string(&state.beers),
            PersistedField::RequestsRemaining => serde_json::to_string(&state.requests_remaining),
            PersistedField::LikedBeerIds => serde_json::to_string(&state.liked_beer_ids),
            PersistedField::CommentsMap => serde_json::to_string(&state.comments),
            PersistedField::BeersInfo => serde_json::to_string(&state.beers_info),
        };
        encoded.map_err(|source| PersistenceError::Encode {
            key: self.key(),
            source,
        })
    }

    /// Decode `raw` and write it into `state`. On error `state` is untouched.
    pub(crate) fn apply(&self, raw: &str, state: &mut StoreState) -> Result<(), PersistenceError> {
        let decode_err = |source| PersistenceError::Decode {
            key: self.key(),
            source,
        };
        match self {
            PersistedField::Beers => {
                let beers: Vec<Beer> = serde_json::from_str(raw).map_err(decode_err)?;
                // Re-establish order and uniqueness in case the file was edited
                state.beers = merge(&[], beers);
            }
            PersistedField::RequestsRemaining => {
                state.requests_remaining = serde_json::from_str(raw).map_err(decode_err)?;
            }
            PersistedField::LikedBeerIds => {
                let ids: Vec<u64> = serde_json::from_str(raw).map_err(decode_err)?;
                let mut unique = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(&id) {
                        unique.push(id);
                    }
                }
                state.liked_beer_ids = unique;
            }
            PersistedField::CommentsMap => {
                let comments: BTreeMap<String, String> = serde_json::from_str(raw).map_err(decode_err)?;
                state.comments = comments;
            }
            PersistedField::BeersInfo => {
                let info: Option<BeersInfo> = serde_json::from_str(raw).map_err(decode_err)?;
                state.beers_info = info;
            }
        }
        Ok(())
    }
}

/// Loads persisted fields into a store and mirrors later changes back.
pub struct Persister {
    storage: Arc<dyn KeyValueStore>,
    writer: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<HookId>>,
}

impl Persister {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            writer: Mutex::new(None),
            subscription: Mutex::new(None),
        }
    }

    /// Restore every persisted field, then mark the store rehydrated.
    ///
    /// A field that cannot be read or decoded is skipped with a warning; the
    /// others still load. Returns the number of fields restored.
    pub async fn rehydrate(&self, store: &CatalogStore) -> usize {
        let mut restored = 0;
        for field in PersistedField::ALL {
            let raw = match self.storage.load(field.key()).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = field.key(), error = %e, "failed to read persisted field");
                    continue;
                }
            };

            let applied = store.mutate(|state, changes| {
                let result = field.apply(&raw, state);
                if result.is_ok() {
                    changes.push(field.change());
                }
                result
            });
            match applied {
                Ok(()) => restored += 1,
                Err(e) => tracing::warn!(error = %e, "skipping persisted field"),
            }
        }

        store.mutate(|state, changes: &mut Changes| {
            state.rehydrated = true;
            changes.push(StoreChange::Rehydrated);
        });
        tracing::info!(restored, "store rehydrated");
        restored
    }

    /// Start mirroring changes of persisted fields to storage.
    ///
    /// Must be called inside a tokio runtime. A second call while attached is
    /// ignored and returns the existing hook.
    pub fn attach(&self, store: &CatalogStore) -> HookId {
        let mut subscription = self.subscription.lock();
        if let Some(id) = *subscription {
            tracing::debug!("persister already attached");
            return id;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(&'static str, String)>();
        let storage = self.storage.clone();
        let writer = tokio::spawn(async move {
            while let Some((key, value)) = rx.recv().await {
                if let Err(e) = storage.save(key, value).await {
                    tracing::warn!(key, error = %e, "failed to persist field");
                }
            }
        });
        *self.writer.lock() = Some(writer);

        let weak = store.downgrade();
        let id = store.subscribe(move |change| {
            let Some(field) = PersistedField::for_change(change) else {
                return;
            };
            let Some(store) = weak.upgrade() else {
                return;
            };
            let encoded = store.read(|state| {
                if state.rehydrated {
                    Some(field.encode(state))
                } else {
                    None
                }
            });
            match encoded {
                Some(Ok(value)) => {
                    if tx.send((field.key(), value)).is_err() {
                        tracing::debug!(key = field.key(), "persistence writer gone, save dropped");
                    }
                }
                Some(Err(e)) => tracing::warn!(error = %e, "failed to encode field"),
                None => {}
            }
        });
        *subscription = Some(id);
        id
    }

    /// Stop mirroring. Queued saves are still written; await `drain` for them.
    pub fn detach(&self, store: &CatalogStore) {
        if let Some(id) = self.subscription.lock().take() {
            store.unsubscribe(id);
        }
    }

    /// Wait until every queued save has been written. Call `detach` first,
    /// otherwise the writer never sees the end of its queue.
    pub async fn drain(&self) {
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::warn!(error = %e, "persistence writer ended abnormally");
            }
        }
    }

    /// Write every persisted field immediately.
    pub async fn flush(&self, store: &CatalogStore) -> Result<(), StoreError> {
        for field in PersistedField::ALL {
            let value = store.read(|state| field.encode(state))?;
            self.storage.save(field.key(), value).await?;
        }
        Ok(())
    }
}
