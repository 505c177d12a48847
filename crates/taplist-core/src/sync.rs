use std::sync::Arc;

use serde_json::json;

use crate::api::AuthProvider;
use crate::error::StoreError;
use crate::store::CatalogStore;

/// Pushes the user's likes and comments to the profile endpoint.
#[derive(Clone)]
pub struct SyncGateway {
    store: CatalogStore,
    auth: Arc<dyn AuthProvider>,
}

impl SyncGateway {
    pub fn new(store: CatalogStore, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// Set (or clear, with `None` or blank text) the comment on a beer, then
    /// push. Fails without touching the comments when the beer is not in the
    /// catalog.
    pub async fn set_annotation(&self, id: u64, text: Option<&str>) -> Result<(), StoreError> {
        self.store.set_comment(id, text)?;
        self.push().await;
        Ok(())
    }

    /// Send the current comments and liked ids. Does nothing when signed out;
    /// failures are recorded in the store's error state.
    pub async fn push(&self) {
        let token = match self.auth.access_token() {
            Some(token) if self.auth.is_authenticated() => token,
            _ => {
                tracing::debug!("not authenticated, skipping profile push");
                return;
            }
        };

        let body = self.store.read(|state| {
            json!({
                "data": {
                    "commentsMap": state.comments,
                    "likedBeerIds": state.liked_beer_ids,
                }
            })
        });

        self.store.set_uploading(true);
        let url = self.store.config().profile_url.clone();
        let result = match self.store.transport().patch_json(&url, &token, &body).await {
            Ok(response) => response.error_for_status().map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            let error = StoreError::Upload(e.to_string());
            tracing::warn!(error = %error, "profile push failed");
            self.store.record_error(&error);
        } else {
            tracing::debug!("profile pushed");
        }
        self.store.set_uploading(false);

        self.refresh_aggregate_info().await;
    }

    /// Reload the global like/comment counts. Never fails; errors end up in
    /// the store's error state.
    pub async fn refresh_aggregate_info(&self) {
        self.store.refresh_beers_info().await;
    }
}
