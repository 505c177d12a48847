//! Reactive, persisted catalog store for a beer catalog API.
//!
//! `CoreRuntime` wires the pieces together: `CatalogStore` holds the catalog
//! and the user's likes and comments, `PreferenceReconciler` keeps liked beers
//! loaded, `SyncGateway` pushes likes and comments to the user's profile, and
//! `Persister` mirrors durable fields to a key-value store.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod reconciler;
pub mod runtime;
pub mod store;
pub mod sync;
pub mod tracing_setup;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{AuthProvider, HttpTransport, SessionAuth, Transport, TransportResponse};
pub use config::CoreConfig;
pub use error::{StoreError, TransportError};
pub use models::{Beer, BeersInfo};
pub use reconciler::PreferenceReconciler;
pub use runtime::CoreRuntime;
pub use store::{CatalogStore, StoreChange, StoreSnapshot};
pub use sync::SyncGateway;
