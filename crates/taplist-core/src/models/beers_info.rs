use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Global like/comment counts served by the application backend.
///
/// Keys are beer ids as strings. Missing sections default to empty so a
/// partial payload still parses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeersInfo {
    pub likes: HashMap<String, u64>,
    pub comments: HashMap<String, u64>,
}

impl BeersInfo {
    pub fn likes_for(&self, id: u64) -> u64 {
        self.likes.get(&id.to_string()).copied().unwrap_or(0)
    }

    pub fn comments_for(&self, id: u64) -> u64 {
        self.comments.get(&id.to_string()).copied().unwrap_or(0)
    }
}
