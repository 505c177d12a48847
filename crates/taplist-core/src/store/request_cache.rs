use std::collections::HashMap;

/// Status of one logical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Never attempted, or the last attempt failed
    #[default]
    Absent,
    InFlight,
    /// Last attempt succeeded and its result is in the catalog
    Done,
}

/// Outcome of `RequestCache::begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// Caller owns the request and must finish it with `complete` or `fail`
    Started,
    /// Another request for the same key is outstanding; use current data
    Reuse,
}

/// Per-resource request tracker guaranteeing at most one in-flight fetch per key.
///
/// Entries are never expired or evicted; only `clear` forgets them.
#[derive(Debug, Default)]
pub struct RequestCache {
    statuses: HashMap<String, FetchStatus>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }

    // ===== Transitions =====

    pub fn begin(&mut self, key: &str) -> Begin {
        let status = self.statuses.entry(key.to_string()).or_default();
        if *status == FetchStatus::InFlight {
            tracing::debug!(key, "request already in flight, reusing current data");
            return Begin::Reuse;
        }
        *status = FetchStatus::InFlight;
        tracing::debug!(key, "request started");
        Begin::Started
    }

    pub fn complete(&mut self, key: &str) {
        match self.statuses.get_mut(key) {
            Some(status) if *status == FetchStatus::InFlight => *status = FetchStatus::Done,
            // A reset while the request was outstanding already forgot the key
            _ => tracing::debug!(key, "completed request no longer tracked"),
        }
    }

    pub fn fail(&mut self, key: &str) {
        if let Some(status) = self.statuses.get(key) {
            if *status == FetchStatus::InFlight {
                self.statuses.remove(key);
            }
        }
    }

    // ===== Queries =====

    pub fn status(&self, key: &str) -> FetchStatus {
        self.statuses.get(key).copied().unwrap_or_default()
    }

    pub fn is_busy(&self, uploading: bool) -> bool {
        uploading || self.in_flight_count() > 0
    }

    /// Number of keys whose last fetch completed.
    ///
    /// This counts `Done` entries, not outstanding ones; use `in_flight_count`
    /// for the number of requests still running.
    pub fn pending_count(&self) -> usize {
        self.count(FetchStatus::Done)
    }

    pub fn in_flight_count(&self) -> usize {
        self.count(FetchStatus::InFlight)
    }

    fn count(&self, wanted: FetchStatus) -> usize {
        self.statuses.values().filter(|s| **s == wanted).count()
    }
}
