//! App configuration.
//!
//! Reads/writes `shopfront.toml`. Every field has a default, so a missing
//! file or a partial one is fine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Commerce backend connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommerceConfig {
    /// GraphQL endpoint. Empty runs against the built-in offline catalog.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint: String,

    /// Storefront access token. Empty sends no token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// `bearer` (default) or the name of the header that carries the token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_header: String,
}

/// Deep-link handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepLinkConfig {
    /// Custom URL scheme, without `://`.
    pub scheme: String,

    /// Universal-link hosts accepted. Empty accepts any host.
    pub hosts: Vec<String>,

    /// Extra first-segment → server-driven page id mappings.
    pub routes: BTreeMap<String, String>,
}

impl Default for DeepLinkConfig {
    fn default() -> Self {
        Self {
            scheme: "app".to_string(),
            hosts: Vec::new(),
            routes: BTreeMap::new(),
        }
    }
}

/// Server-driven UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Where the rendering engine fetches page definitions.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_service: String,

    /// Page shown at launch. Empty starts on Home.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub initial_page: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub commerce: CommerceConfig,
    pub deep_link: DeepLinkConfig,
    pub ui: UiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            commerce: CommerceConfig::default(),
            deep_link: DeepLinkConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default config file path: ./shopfront.toml.
    pub fn default_path() -> PathBuf {
        PathBuf::from("shopfront.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write this config to `path` unless a file is already there.
    pub fn init(&self, path: &Path, force: bool) -> anyhow::Result<()> {
        anyhow::ensure!(
            force || !path.exists(),
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
        self.save(path)
    }

    /// Whether a real backend is configured.
    pub fn is_online(&self) -> bool {
        !self.commerce.endpoint.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.deep_link.scheme, "app");
        assert!(!config.is_online());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shopfront.toml");
        std::fs::write(
            &path,
            r#"
[commerce]
endpoint = "https://shop.example/api/graphql"
token_header = "X-Storefront-Access-Token"

[deep_link]
hosts = ["shop.example"]

[deep_link.routes]
product = "product_detail"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(config.is_online());
        assert_eq!(config.commerce.token_header, "X-Storefront-Access-Token");
        assert_eq!(config.deep_link.scheme, "app");
        assert_eq!(config.deep_link.hosts, vec!["shop.example"]);
        assert_eq!(config.deep_link.routes["product"], "product_detail");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shopfront.toml");

        let mut config = AppConfig::default();
        config.log_filter = "debug".to_string();
        config.ui.initial_page = "landing".to_string();
        config.save(&path).unwrap();

        let back = AppConfig::load(&path).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shopfront.toml");
        std::fs::write(&path, "log_filter = \"warn\"\n").unwrap();

        let config = AppConfig::default();
        assert!(config.init(&path, false).is_err());
        assert_eq!(AppConfig::load(&path).unwrap().log_filter, "warn");

        config.init(&path, true).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_init_writes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shopfront.toml");
        AppConfig::default().init(&path, false).unwrap();
        assert!(path.exists());
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "log_filter = [").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
