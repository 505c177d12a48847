use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_API_BASE, DEFAULT_APP_BASE, DEFAULT_DATA_DIR, DEFAULT_PROFILE_URL};

/// Runtime configuration for the core. Can be loaded from a JSON file and
/// overridden from `TAPLIST_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Directory holding the persisted store fields
    pub data_dir: PathBuf,
    /// Base URL of the catalog API (`{api_base}/beers`)
    pub api_base: String,
    /// Base URL of the application backend (`{app_base}/beers-info`)
    pub app_base: String,
    /// Profile endpoint receiving liked ids and comments
    pub profile_url: String,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load config from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CoreConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply `TAPLIST_DATA_DIR`, `TAPLIST_API_BASE`, `TAPLIST_APP_BASE` and
    /// `TAPLIST_PROFILE_URL` overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("TAPLIST_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(base) = lookup("TAPLIST_API_BASE") {
            self.api_base = base;
        }
        if let Some(base) = lookup("TAPLIST_APP_BASE") {
            self.app_base = base;
        }
        if let Some(url) = lookup("TAPLIST_PROFILE_URL") {
            self.profile_url = url;
        }
        self
    }

    pub fn beers_url(&self) -> String {
        format!("{}/beers", self.api_base.trim_end_matches('/'))
    }

    pub fn beer_url(&self, id: u64) -> String {
        format!("{}/{}", self.beers_url(), id)
    }

    pub fn beers_info_url(&self) -> String {
        format!("{}/beers-info", self.app_base.trim_end_matches('/'))
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_base: DEFAULT_API_BASE.to_string(),
            app_base: DEFAULT_APP_BASE.to_string(),
            profile_url: DEFAULT_PROFILE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config_minimal() {
        let config: CoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_parse_config_with_urls() {
        let json = r#"{
            "dataDir": "/tmp/taplist",
            "apiBase": "http://localhost:9000/v2/",
            "appBase": "http://localhost:9001"
        }"#;
        let config: CoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/taplist"));
        assert_eq!(config.beers_url(), "http://localhost:9000/v2/beers");
        assert_eq!(config.beer_url(7), "http://localhost:9000/v2/beers/7");
        assert_eq!(config.beers_info_url(), "http://localhost:9001/beers-info");
        assert_eq!(config.profile_url, DEFAULT_PROFILE_URL);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TAPLIST_API_BASE", "http://api.test"),
            ("TAPLIST_PROFILE_URL", "http://app.test/me"),
        ]
        .into_iter()
        .collect();

        let config = CoreConfig::new("data")
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.api_base, "http://api.test");
        assert_eq!(config.profile_url, "http://app.test/me");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.app_base, DEFAULT_APP_BASE);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taplist.json");
        std::fs::write(&path, r#"{"appBase": "http://app.test"}"#).unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.app_base, "http://app.test");

        let missing = CoreConfig::load(&dir.path().join("missing.json"));
        assert!(missing.is_err());
    }
}
