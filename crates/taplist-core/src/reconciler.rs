use futures::future::join_all;
use parking_lot::Mutex;

use crate::store::{spawn_detached, CatalogStore, HookId, StoreChange};
use crate::sync::SyncGateway;

/// Keeps the liked-beer set backed by catalog entries.
///
/// Whenever the catalog or the liked set changes, the reconciler compares the
/// number of liked ids with the number of liked beers present in the catalog.
/// If they differ it loads every liked id concurrently; ids already in the
/// catalog return without a request, so only the missing ones hit the network.
/// Individual failures are left in the store's error state and never stop the
/// other loads.
#[derive(Clone)]
pub struct PreferenceReconciler {
    store: CatalogStore,
    gateway: SyncGateway,
}

impl PreferenceReconciler {
    pub fn new(store: CatalogStore, gateway: SyncGateway) -> Self {
        Self { store, gateway }
    }

    /// Watch the store and reconcile in the background after relevant changes.
    ///
    /// A pass starts only when the liked ids or the liked beers present in the
    /// catalog differ from what the previous evaluation saw, so an id that
    /// stays missing after a successful fetch is not requested again until
    /// one of them changes.
    pub fn attach(&self) -> HookId {
        let weak = self.store.downgrade();
        let last_seen: Mutex<Option<LikedView>> = Mutex::new(None);
        self.store.subscribe(move |change| {
            if !matches!(
                change,
                StoreChange::Catalog | StoreChange::LikedBeers | StoreChange::Rehydrated
            ) {
                return;
            }
            let Some(store) = weak.upgrade() else {
                return;
            };
            let view = liked_view(&store);
            {
                let mut last_seen = last_seen.lock();
                if last_seen.as_ref() == Some(&view) {
                    return;
                }
                *last_seen = Some(view.clone());
            }
            if !view.needs_reconcile() {
                return;
            }
            spawn_detached("reconcile-liked-beers", async move {
                load_liked(&store).await;
            });
        })
    }

    /// Run one reconciliation pass and wait for it. Returns the number of
    /// loads issued, 0 when everything liked is already in the catalog.
    pub async fn reconcile(&self) -> usize {
        if !needs_reconcile(&self.store) {
            return 0;
        }
        load_liked(&self.store).await
    }

    /// Like or unlike a beer, then push the new state. Returns true when the
    /// beer is liked afterwards.
    pub async fn toggle(&self, id: u64) -> bool {
        let liked = self.store.toggle_liked(id);
        tracing::debug!(id, liked, "toggled like");
        self.gateway.push().await;
        liked
    }
}

/// Liked ids and the subset of them present in the catalog, both sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LikedView {
    liked: Vec<u64>,
    present: Vec<u64>,
}

impl LikedView {
    fn needs_reconcile(&self) -> bool {
        self.present.len() != self.liked.len()
    }
}

fn liked_view(store: &CatalogStore) -> LikedView {
    store.read(|state| {
        let mut liked = state.liked_beer_ids.clone();
        liked.sort_unstable();
        let mut present: Vec<u64> = state
            .beers
            .iter()
            .map(|b| b.id)
            .filter(|id| state.liked_beer_ids.contains(id))
            .collect();
        present.sort_unstable();
        present.dedup();
        LikedView { liked, present }
    })
}

fn needs_reconcile(store: &CatalogStore) -> bool {
    liked_view(store).needs_reconcile()
}

async fn load_liked(store: &CatalogStore) -> usize {
    let ids = store.liked_beer_ids();
    tracing::debug!(count = ids.len(), "reconciling liked beers");

    let results = join_all(ids.iter().map(|id| store.load_one(*id))).await;
    for (id, result) in ids.iter().zip(&results) {
        if let Err(e) = result {
            tracing::debug!(id, error = %e, "liked beer not loaded");
        }
    }
    ids.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{SessionAuth, TransportResponse};
    use crate::config::CoreConfig;
    use crate::test_support::{beers_json, wait_until, FakeTransport};
    use std::sync::Arc;

    fn setup() -> (PreferenceReconciler, CatalogStore, Arc<FakeTransport>) {
        let transport = FakeTransport::new();
        let store = CatalogStore::new(CoreConfig::default(), transport.clone());
        let gateway = SyncGateway::new(store.clone(), Arc::new(SessionAuth::new()));
        (PreferenceReconciler::new(store.clone(), gateway), store, transport)
    }

    #[tokio::test]
    async fn test_reconcile_fetches_missing_liked_beer_once() {
        let (reconciler, store, transport) = setup();
        let url = CoreConfig::default().beer_url(3);
        transport.respond(&url, TransportResponse::new(200, beers_json(&[(3, "Electric India")])));
        store.toggle_liked(3);

        assert_eq!(reconciler.reconcile().await, 1);
        assert_eq!(store.beers().iter().map(|b| b.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(transport.calls_to(&url), 1);

        // Already reconciled: no further loads
        assert_eq!(reconciler.reconcile().await, 0);
        assert_eq!(reconciler.reconcile().await, 0);
        assert_eq!(transport.calls_to(&url), 1);
    }

    #[tokio::test]
    async fn test_attached_watcher_reconciles_in_background() {
        let (reconciler, store, transport) = setup();
        let url = CoreConfig::default().beer_url(3);
        transport.respond(&url, TransportResponse::new(200, beers_json(&[(3, "Electric India")])));
        reconciler.attach();

        reconciler.toggle(3).await;
        assert!(wait_until(|| store.contains(3)).await);

        // Let any follow-up evaluation run; it must not fetch again
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.beers().len(), 1);
        assert_eq!(transport.calls_to(&url), 1);
    }

    #[tokio::test]
    async fn test_watcher_settles_when_liked_beer_stays_missing() {
        let (reconciler, store, transport) = setup();
        let url = CoreConfig::default().beer_url(42);
        transport.respond(&url, TransportResponse::new(200, "[]"));
        reconciler.attach();

        reconciler.toggle(42).await;
        assert!(wait_until(|| transport.calls_to(&url) == 1).await);
        for _ in 0..500 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.calls_to(&url), 1);
        assert!(store.beers().is_empty());

        // A new like is a new liked set, so the watcher runs again
        transport.respond(
            &CoreConfig::default().beer_url(7),
            TransportResponse::new(200, beers_json(&[(7, "Punk IPA")])),
        );
        reconciler.toggle(7).await;
        assert!(wait_until(|| store.contains(7)).await);
        for _ in 0..200 {
            tokio::task::yield_now().await;
        }
        let settled = transport.calls_to(&url);
        for _ in 0..500 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.calls_to(&url), settled);
        assert_eq!(transport.calls_to(&CoreConfig::default().beer_url(7)), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_siblings() {
        let (reconciler, store, transport) = setup();
        let config = CoreConfig::default();
        transport.respond(&config.beer_url(1), TransportResponse::new(200, beers_json(&[(1, "Buzz")])));
        transport.respond(&config.beer_url(2), TransportResponse::new(500, "down"));
        transport.respond(&config.beer_url(4), TransportResponse::new(200, beers_json(&[(4, "Pilsen Lager")])));
        for id in [1, 2, 4] {
            store.toggle_liked(id);
        }

        assert_eq!(reconciler.reconcile().await, 3);
        assert!(store.contains(1));
        assert!(store.contains(4));
        assert!(!store.contains(2));
        assert!(store.error().is_some());

        // Still out of sync, so the next pass retries and only 2 hits the network
        transport.respond(&config.beer_url(2), TransportResponse::new(200, beers_json(&[(2, "Trashy Blonde")])));
        assert_eq!(reconciler.reconcile().await, 3);
        assert!(store.contains(2));
        assert_eq!(transport.calls_to(&config.beer_url(1)), 1);
        assert_eq!(transport.calls_to(&config.beer_url(2)), 2);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_membership() {
        let (reconciler, store, _) = setup();
        store.toggle_liked(5);
        let before = store.liked_beer_ids();

        assert!(reconciler.toggle(8).await);
        assert!(store.is_liked(8));
        assert!(!reconciler.toggle(8).await);
        assert_eq!(store.liked_beer_ids(), before);
    }

    #[tokio::test]
    async fn test_unlike_absent_beer_is_reconciled() {
        let (reconciler, store, _) = setup();
        store.toggle_liked(6);
        store.toggle_liked(6);
        assert_eq!(reconciler.reconcile().await, 0);
    }
}
