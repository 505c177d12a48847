//! Application-wide constants
//!
//! Centralized location for endpoint defaults, header names and
//! persistence keys that are used across multiple modules.

/// Default directory for persisted state
pub const DEFAULT_DATA_DIR: &str = "taplist_data";

/// Default catalog API
pub const DEFAULT_API_BASE: &str = "https://api.punkapi.com/v2";

/// Default application backend (aggregate info)
pub const DEFAULT_APP_BASE: &str = "http://localhost:8080/api";

/// Default profile endpoint for pushing likes and comments
pub const DEFAULT_PROFILE_URL: &str = "http://localhost:8080/api/users/me";

/// Response header carrying the remaining request quota
pub const QUOTA_HEADER: &str = "x-ratelimit-remaining";

/// Resource keys used by the request cache
pub mod resources {
    /// Whole catalog
    pub const ALL: &str = "all";

    /// Single beer by id
    pub fn one(id: u64) -> String {
        format!("one:{}", id)
    }
}

/// Keys under which store fields are persisted
pub mod storage_keys {
    pub const BEERS: &str = "beers";
    pub const REQUESTS_REMAINING: &str = "requestsRemaining";
    pub const LIKED_BEER_IDS: &str = "likedBeerIds";
    pub const COMMENTS_MAP: &str = "commentsMap";
    pub const BEERS_INFO: &str = "beersInfo";
}
