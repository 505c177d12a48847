use std::sync::Arc;

/// What part of the store a mutation touched. Delivered to every registered
/// hook after the mutation has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreChange {
    Catalog,
    LikedBeers,
    Comments,
    Quota,
    BeersInfo,
    Selection,
    Error,
    Requests,
    Uploading,
    Rehydrated,
}

pub(crate) type ChangeHook = Arc<dyn Fn(StoreChange) + Send + Sync>;

/// Handle returned by `CatalogStore::subscribe`, used to remove the hook again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub(crate) u64);

/// Changes collected while the state lock is held, emitted once it is released.
#[derive(Debug, Default)]
pub struct Changes {
    pending: Vec<StoreChange>,
}

impl Changes {
    pub fn push(&mut self, change: StoreChange) {
        if !self.pending.contains(&change) {
            self.pending.push(change);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn into_vec(self) -> Vec<StoreChange> {
        self.pending
    }
}
