//! Persisted provider records (`providers.json`).
//!
//! ```json
//! {
//!   "chat":      { "gpt": { "factory": "OpenAI", "model_name": "gpt-4o-mini" } },
//!   "embedding": { "bge": { "factory": "BAAI" } }
//! }
//! ```
//!
//! Records without a credential fall back to the vendor's environment
//! variable (`OPENAI_API_KEY`, `DASHSCOPE_API_KEY`, ...) when models are
//! built; the fallback is never written back to disk.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ragsage_core::ProviderConfig;

/// One configured provider instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRecord {
    /// Vendor factory name (`OpenAI`, `Tongyi-Qianwen`, `BAAI`, ...).
    pub factory: String,
    #[serde(flatten)]
    pub config: ProviderConfig,
}

impl ProviderRecord {
    pub fn new(factory: impl Into<String>, config: ProviderConfig) -> Self {
        Self {
            factory: factory.into(),
            config,
        }
    }

    /// Config with the credential taken from `env_var` when the record has none.
    pub fn resolved_config(&self, env_var: Option<&str>) -> ProviderConfig {
        let mut config = self.config.clone();
        if config.credential.is_empty() {
            if let Some(key) = env_var.and_then(|var| std::env::var(var).ok()) {
                config.credential = key;
            }
        }
        config
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderRegistry {
    #[serde(default)]
    pub chat: BTreeMap<String, ProviderRecord>,
    #[serde(default)]
    pub embedding: BTreeMap<String, ProviderRecord>,
}

impl ProviderRegistry {
    /// Load from disk. A missing file yields an empty registry; an
    /// unreadable one is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(_) => {
                info!("No provider registry at {}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Ignoring malformed provider registry {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> ragsage_core::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Saved provider registry to {}", path.display());
        Ok(())
    }
}
