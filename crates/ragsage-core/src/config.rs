//! Configuration and data directory management.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-call timeout for upstream provider requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Paths to all RagSage data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Local embedding model bundles (`data/models/`).
    pub models: PathBuf,
    /// Persisted provider records (`data/providers.json`).
    pub providers_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            models: root.join("models"),
            providers_file: root.join("providers.json"),
            root,
        };
        std::fs::create_dir_all(&paths.models)?;
        Ok(paths)
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSageConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
}

impl RagSageConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9380);

        Ok(Self {
            port,
            data_paths: DataPaths::new(data_dir)?,
        })
    }
}

/// Construction parameters for one provider instance. Never mutated after
/// the provider is built.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Vendor-specific extras (`timeout_secs`, `model_dir`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("credential", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("extra", &self.extra)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(credential: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Endpoint URL without a trailing slash, or `default` when unset or blank.
    pub fn endpoint_or(&self, default: &str) -> String {
        match self.endpoint_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => default.to_string(),
        }
    }

    /// Configured endpoint URL, if one was given.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Model name, or `default` when blank.
    pub fn model_or(&self, default: &str) -> String {
        if self.model_name.trim().is_empty() {
            default.to_string()
        } else {
            self.model_name.clone()
        }
    }

    /// Per-call upstream timeout (`extra.timeout_secs`, default 60s).
    pub fn timeout(&self) -> Duration {
        let secs = self
            .extra
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}
