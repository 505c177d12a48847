pub mod catalog_store;
pub mod changes;
pub mod merge;
pub mod persistence;
pub mod request_cache;

pub use catalog_store::{CatalogStore, StoreSnapshot, WeakCatalogStore};
pub use changes::{HookId, StoreChange};
pub use merge::merge;
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore, PersistedField, Persister};
pub use request_cache::{Begin, FetchStatus, RequestCache};

use std::future::Future;

/// Run `fut` on the current tokio runtime without awaiting it.
///
/// Outside a runtime the task is dropped with a warning.
pub(crate) fn spawn_detached<F>(what: &'static str, fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
        }
        Err(_) => tracing::warn!(task = what, "no tokio runtime, background task skipped"),
    }
}
