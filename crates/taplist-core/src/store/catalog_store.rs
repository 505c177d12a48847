use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;

use crate::api::{Transport, TransportResponse};
use crate::config::CoreConfig;
use crate::constants::{resources, QUOTA_HEADER};
use crate::error::{StoreError, TransportError};
use crate::models::{Beer, BeersInfo};
use crate::store::changes::{ChangeHook, Changes, HookId, StoreChange};
use crate::store::merge::merge;
use crate::store::request_cache::{Begin, FetchStatus, RequestCache};
use crate::store::spawn_detached;

/// Everything the store tracks. Only touched under the store lock.
#[derive(Debug, Default)]
pub struct StoreState {
    pub beers: Vec<Beer>,
    pub requests: RequestCache,
    pub selected: Option<Beer>,
    pub error: Option<String>,
    pub requests_remaining: u64,
    pub liked_beer_ids: Vec<u64>,
    pub comments: BTreeMap<String, String>,
    pub beers_info: Option<BeersInfo>,
    pub uploading: bool,
    pub rehydrated: bool,
}

impl StoreState {
    fn clear_error(&mut self, changes: &mut Changes) {
        if self.error.take().is_some() {
            changes.push(StoreChange::Error);
        }
    }

    fn set_error(&mut self, message: String, changes: &mut Changes) {
        self.error = Some(message);
        changes.push(StoreChange::Error);
    }

    fn contains(&self, id: u64) -> bool {
        self.beers.iter().any(|b| b.id == id)
    }

    fn liked_beers(&self) -> Vec<Beer> {
        self.beers
            .iter()
            .filter(|b| self.liked_beer_ids.contains(&b.id))
            .cloned()
            .collect()
    }
}

/// Serializable view of the observable state, for a rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub beers: Vec<Beer>,
    pub selected: Option<Beer>,
    pub error: Option<String>,
    pub requests_remaining: u64,
    pub liked_beer_ids: Vec<u64>,
    pub comments: BTreeMap<String, String>,
    pub beers_info: Option<BeersInfo>,
    pub is_busy: bool,
    pub is_uploading: bool,
    pub request_count: usize,
}

struct Inner {
    config: CoreConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<StoreState>,
    hooks: Mutex<Vec<(HookId, ChangeHook)>>,
    next_hook_id: AtomicU64,
}

/// Authoritative in-memory catalog plus the user's likes and comments.
///
/// Cheap to clone; all clones share one state. Every state transition happens
/// inside a single lock acquisition and the lock is never held across an
/// `.await`.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Inner>,
}

/// Non-owning handle, used by hooks so they don't keep the store alive.
#[derive(Clone)]
pub struct WeakCatalogStore {
    inner: Weak<Inner>,
}

impl WeakCatalogStore {
    pub fn upgrade(&self) -> Option<CatalogStore> {
        self.inner.upgrade().map(|inner| CatalogStore { inner })
    }
}

impl CatalogStore {
    pub fn new(config: CoreConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state: Mutex::new(StoreState::default()),
                hooks: Mutex::new(Vec::new()),
                next_hook_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakCatalogStore {
        WeakCatalogStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    // ===== Hooks =====

    /// Register a hook run after every mutation, outside the state lock.
    pub fn subscribe<F>(&self, hook: F) -> HookId
    where
        F: Fn(StoreChange) + Send + Sync + 'static,
    {
        let id = HookId(self.inner.next_hook_id.fetch_add(1, Ordering::Relaxed));
        self.inner.hooks.lock().push((id, Arc::new(hook)));
        id
    }

    /// Remove one hook. Returns false when it was not registered.
    pub fn unsubscribe(&self, id: HookId) -> bool {
        let mut hooks = self.inner.hooks.lock();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    /// Remove every hook, including ones registered by embedders.
    pub fn clear_hooks(&self) {
        self.inner.hooks.lock().clear();
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.inner.state.lock())
    }

    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut StoreState, &mut Changes) -> R) -> R {
        let mut changes = Changes::default();
        let result = {
            let mut state = self.inner.state.lock();
            f(&mut state, &mut changes)
        };
        self.emit(changes);
        result
    }

    fn emit(&self, changes: Changes) {
        if changes.is_empty() {
            return;
        }
        // Snapshot so hooks may register hooks or mutate the store themselves
        let hooks: Vec<ChangeHook> = self
            .inner
            .hooks
            .lock()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for change in changes.into_vec() {
            for hook in &hooks {
                hook(change);
            }
        }
    }

    // ===== Read views =====

    pub fn beers(&self) -> Vec<Beer> {
        self.read(|s| s.beers.clone())
    }

    pub fn beer(&self, id: u64) -> Option<Beer> {
        self.read(|s| s.beers.iter().find(|b| b.id == id).cloned())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.read(|s| s.contains(id))
    }

    pub fn selected(&self) -> Option<Beer> {
        self.read(|s| s.selected.clone())
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    pub fn requests_remaining(&self) -> u64 {
        self.read(|s| s.requests_remaining)
    }

    pub fn liked_beer_ids(&self) -> Vec<u64> {
        self.read(|s| s.liked_beer_ids.clone())
    }

    /// Liked beers that are present in the catalog, in catalog order
    pub fn liked_beers(&self) -> Vec<Beer> {
        self.read(|s| s.liked_beers())
    }

    pub fn is_liked(&self, id: u64) -> bool {
        self.read(|s| s.liked_beer_ids.contains(&id))
    }

    pub fn comments(&self) -> BTreeMap<String, String> {
        self.read(|s| s.comments.clone())
    }

    pub fn comment(&self, id: u64) -> Option<String> {
        self.read(|s| s.comments.get(&id.to_string()).cloned())
    }

    pub fn beers_info(&self) -> Option<BeersInfo> {
        self.read(|s| s.beers_info.clone())
    }

    pub fn is_uploading(&self) -> bool {
        self.read(|s| s.uploading)
    }

    pub fn is_busy(&self) -> bool {
        self.read(|s| s.requests.is_busy(s.uploading))
    }

    /// Number of resources whose fetch has completed
    pub fn pending_count(&self) -> usize {
        self.read(|s| s.requests.pending_count())
    }

    pub fn in_flight_count(&self) -> usize {
        self.read(|s| s.requests.in_flight_count())
    }

    pub fn fetch_status(&self, key: &str) -> FetchStatus {
        self.read(|s| s.requests.status(key))
    }

    pub fn is_rehydrated(&self) -> bool {
        self.read(|s| s.rehydrated)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(|s| StoreSnapshot {
            beers: s.beers.clone(),
            selected: s.selected.clone(),
            error: s.error.clone(),
            requests_remaining: s.requests_remaining,
            liked_beer_ids: s.liked_beer_ids.clone(),
            comments: s.comments.clone(),
            beers_info: s.beers_info.clone(),
            is_busy: s.requests.is_busy(s.uploading),
            is_uploading: s.uploading,
            request_count: s.requests.pending_count(),
        })
    }

    // ===== Catalog actions =====

    /// Fetch the whole catalog and merge it in.
    ///
    /// Returns the fetched beers; empty when the request failed (the failure is
    /// in `error()`) or when the catalog currently holds nothing and another
    /// load is already running.
    pub async fn load_all(&self) -> Vec<Beer> {
        let url = self.config().beers_url();
        self.fetch(resources::ALL, &url, |state| state.beers.clone())
            .await
    }

    /// Return beer `id`, fetching it only when it is not in the catalog yet.
    pub async fn load_one(&self, id: u64) -> Result<Beer, StoreError> {
        if let Some(beer) = self.beer(id) {
            return Ok(beer);
        }

        let key = resources::one(id);
        let url = self.config().beer_url(id);
        let fetched = self
            .fetch(&key, &url, |state| {
                state.beers.iter().filter(|b| b.id == id).cloned().collect()
            })
            .await;

        fetched
            .into_iter()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Select the beer identified by `raw_id`. Never fails: problems end up
    /// in `error()` and leave the selection untouched.
    pub async fn select(&self, raw_id: &str) {
        self.mutate(|state, changes| state.clear_error(changes));
        self.spawn_beers_info_refresh();

        let result = match parse_beer_id(raw_id) {
            Ok(id) => self.load_one(id).await,
            Err(e) => Err(e),
        };

        self.mutate(|state, changes| match result {
            Ok(beer) => {
                state.selected = Some(beer);
                changes.push(StoreChange::Selection);
            }
            Err(e) => {
                tracing::debug!(raw_id, error = %e, "selection failed");
                state.set_error(e.to_string(), changes);
            }
        });
    }

    pub fn deselect(&self) {
        self.mutate(|state, changes| {
            if state.selected.take().is_some() {
                changes.push(StoreChange::Selection);
            }
        });
    }

    /// Drop the catalog, request statuses and quota counter. Likes and
    /// comments are kept.
    pub fn reset(&self) {
        tracing::info!("resetting catalog");
        self.mutate(|state, changes| {
            state.beers.clear();
            state.requests.clear();
            state.requests_remaining = 0;
            changes.push(StoreChange::Catalog);
            changes.push(StoreChange::Requests);
            changes.push(StoreChange::Quota);
        });
    }

    /// Shared fetch path. Errors are recorded in the error state and turned
    /// into an empty result; they never propagate.
    async fn fetch<F>(&self, key: &str, url: &str, current: F) -> Vec<Beer>
    where
        F: FnOnce(&StoreState) -> Vec<Beer>,
    {
        let reused = self.mutate(|state, changes| {
            state.clear_error(changes);
            match state.requests.begin(key) {
                Begin::Reuse => Some(current(state)),
                Begin::Started => {
                    changes.push(StoreChange::Requests);
                    None
                }
            }
        });
        if let Some(beers) = reused {
            return beers;
        }

        match self.request_beers(url).await {
            Ok((beers, quota)) => {
                tracing::debug!(key, count = beers.len(), "fetch complete");
                self.mutate(|state, changes| {
                    let merged = merge(&state.beers, beers.iter().cloned());
                    if merged != state.beers {
                        state.beers = merged;
                        changes.push(StoreChange::Catalog);
                    }
                    if let Some(quota) = quota {
                        state.requests_remaining = quota;
                        changes.push(StoreChange::Quota);
                    }
                    state.requests.complete(key);
                    changes.push(StoreChange::Requests);
                });
                beers
            }
            Err(e) => {
                let error = StoreError::from(e);
                tracing::warn!(key, error = %error, "fetch failed");
                self.mutate(|state, changes| {
                    state.requests.fail(key);
                    changes.push(StoreChange::Requests);
                    state.set_error(error.to_string(), changes);
                });
                Vec::new()
            }
        }
    }

    async fn request_beers(&self, url: &str) -> Result<(Vec<Beer>, Option<u64>), TransportError> {
        let response = self.transport().get(url).await?.error_for_status()?;
        let quota = parse_quota(&response);
        let beers = Beer::list_from_json(&response.body)?;
        Ok((beers, quota))
    }

    // ===== Aggregate info =====

    /// Fetch the global like/comment counts. Failures only reach `error()`.
    pub(crate) async fn refresh_beers_info(&self) {
        let result = self.request_beers_info().await;

        self.mutate(|state, changes| match result {
            Ok(info) => {
                state.beers_info = Some(info);
                changes.push(StoreChange::BeersInfo);
            }
            Err(e) => {
                tracing::warn!(error = %e, "beers info refresh failed");
                state.set_error(StoreError::from(e).to_string(), changes);
            }
        });
    }

    async fn request_beers_info(&self) -> Result<BeersInfo, TransportError> {
        let url = self.config().beers_info_url();
        let response = self.transport().get(&url).await?.error_for_status()?;
        Ok(serde_json::from_str(&response.body)?)
    }

    pub(crate) fn spawn_beers_info_refresh(&self) {
        let weak = self.downgrade();
        spawn_detached("beers-info-refresh", async move {
            if let Some(store) = weak.upgrade() {
                store.refresh_beers_info().await;
            }
        });
    }

    // ===== Preference mutations =====

    /// Flip membership of `id` in the liked set. Returns true when the beer
    /// is liked afterwards.
    pub(crate) fn toggle_liked(&self, id: u64) -> bool {
        self.mutate(|state, changes| {
            let liked = if state.liked_beer_ids.contains(&id) {
                state.liked_beer_ids.retain(|liked| *liked != id);
                false
            } else {
                state.liked_beer_ids.push(id);
                true
            };
            changes.push(StoreChange::LikedBeers);
            liked
        })
    }

    /// Set or clear the comment for a beer that is in the catalog.
    pub(crate) fn set_comment(&self, id: u64, text: Option<&str>) -> Result<(), StoreError> {
        self.mutate(|state, changes| {
            if !state.contains(id) {
                return Err(StoreError::PreconditionFailed(id));
            }
            match text.filter(|t| !t.trim().is_empty()) {
                Some(text) => {
                    state.comments.insert(id.to_string(), text.to_string());
                }
                None => {
                    state.comments.remove(&id.to_string());
                }
            }
            changes.push(StoreChange::Comments);
            Ok(())
        })
    }

    pub(crate) fn set_uploading(&self, uploading: bool) {
        self.mutate(|state, changes| {
            if state.uploading != uploading {
                state.uploading = uploading;
                changes.push(StoreChange::Uploading);
            }
        });
    }

    pub(crate) fn record_error(&self, error: &StoreError) {
        self.mutate(|state, changes| state.set_error(error.to_string(), changes));
    }
}

/// Parse user input into a beer id. Accepts integral numbers written as
/// floats ("7.0"); rejects anything negative, fractional or non-finite.
pub fn parse_beer_id(raw: &str) -> Result<u64, StoreError> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<u64>() {
        return Ok(id);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value >= 0.0 && value <= u64::MAX as f64 => {
            Ok(value as u64)
        }
        _ => Err(StoreError::InvalidArgument(raw.to_string())),
    }
}

fn parse_quota(response: &TransportResponse) -> Option<u64> {
    let raw = response.header(QUOTA_HEADER)?;
    match raw.trim().parse::<u64>() {
        Ok(quota) => Some(quota),
        Err(_) => {
            tracing::debug!(raw, "ignoring unparsable quota header");
            None
        }
    }
}
