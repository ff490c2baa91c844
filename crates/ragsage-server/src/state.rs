//! Shared application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use ragsage_chat::{create_chat_model, ChatBackend, ChatModel};
use ragsage_core::{ProviderError, RagSageConfig};
use ragsage_infer::{create_embedding_model, EmbeddingBackend, EmbeddingModel, LocalModels};

use crate::registry::{ProviderRecord, ProviderRegistry};

/// Public view of one provider instance; never carries the credential.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderSummary {
    pub id: String,
    pub factory: String,
    pub model: String,
}

/// Shared application state accessible from all route handlers.
///
/// Provider instances are built once at startup and shared read-only.
pub struct AppState {
    pub config: RagSageConfig,
    pub chat_models: BTreeMap<String, Arc<dyn ChatModel>>,
    pub embedding_models: BTreeMap<String, Arc<dyn EmbeddingModel>>,
}

impl AppState {
    /// Build every provider in `registry`. Records that fail to build are
    /// logged and skipped so one bad entry does not keep the server down.
    pub fn build(
        config: RagSageConfig,
        registry: &ProviderRegistry,
        local_models: &LocalModels,
    ) -> Self {
        let mut chat_models = BTreeMap::new();
        for (id, record) in &registry.chat {
            match build_chat(record) {
                Ok(model) => {
                    chat_models.insert(id.clone(), model);
                }
                Err(e) => warn!("Skipping chat provider {}: {}", id, e),
            }
        }

        let mut embedding_models = BTreeMap::new();
        for (id, record) in &registry.embedding {
            match build_embedding(record, local_models) {
                Ok(model) => {
                    embedding_models.insert(id.clone(), model);
                }
                Err(e) => warn!("Skipping embedding provider {}: {}", id, e),
            }
        }

        info!(
            "Providers ready: {} chat, {} embedding",
            chat_models.len(),
            embedding_models.len()
        );

        Self {
            config,
            chat_models,
            embedding_models,
        }
    }

    pub fn chat_model(&self, id: &str) -> Option<Arc<dyn ChatModel>> {
        self.chat_models.get(id).cloned()
    }

    pub fn embedding_model(&self, id: &str) -> Option<Arc<dyn EmbeddingModel>> {
        self.embedding_models.get(id).cloned()
    }

    pub fn chat_summaries(&self) -> Vec<ProviderSummary> {
        self.chat_models
            .iter()
            .map(|(id, model)| ProviderSummary {
                id: id.clone(),
                factory: model.backend().factory_name().to_string(),
                model: model.model_name().to_string(),
            })
            .collect()
    }

    pub fn embedding_summaries(&self) -> Vec<ProviderSummary> {
        self.embedding_models
            .iter()
            .map(|(id, model)| ProviderSummary {
                id: id.clone(),
                factory: model.backend().factory_name().to_string(),
                model: model.model_name().to_string(),
            })
            .collect()
    }
}

fn build_chat(record: &ProviderRecord) -> Result<Arc<dyn ChatModel>, ProviderError> {
    let backend: ChatBackend = record.factory.parse()?;
    create_chat_model(backend, &record.resolved_config(backend.credential_env()))
}

fn build_embedding(
    record: &ProviderRecord,
    local_models: &LocalModels,
) -> Result<Arc<dyn EmbeddingModel>, ProviderError> {
    let backend: EmbeddingBackend = record.factory.parse()?;
    create_embedding_model(
        backend,
        &record.resolved_config(backend.credential_env()),
        local_models,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragsage_core::{DataPaths, ProviderConfig};

    fn test_config(dir: &std::path::Path) -> RagSageConfig {
        RagSageConfig {
            port: 0,
            data_paths: DataPaths::new(dir).unwrap(),
        }
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ProviderRegistry::default();
        registry.chat.insert(
            "gpt".into(),
            ProviderRecord::new("OpenAI", ProviderConfig::new("sk-test", "gpt-4o-mini")),
        );
        registry
            .chat
            .insert("bogus".into(), ProviderRecord::new("Cohere", ProviderConfig::default()));
        // Ollama without an endpoint cannot be built
        registry.embedding.insert(
            "nomic".into(),
            ProviderRecord::new("Ollama", ProviderConfig::new("", "nomic-embed-text")),
        );
        registry
            .embedding
            .insert("bge".into(), ProviderRecord::new("BAAI", ProviderConfig::default()));

        let local = LocalModels::with_default_loader(dir.path().join("models"));
        let state = AppState::build(test_config(dir.path()), &registry, &local);

        assert!(state.chat_model("gpt").is_some());
        assert!(state.chat_model("bogus").is_none());
        assert!(state.embedding_model("nomic").is_none());
        assert!(state.embedding_model("bge").is_some());

        let chat = state.chat_summaries();
        assert_eq!(
            chat,
            vec![ProviderSummary {
                id: "gpt".into(),
                factory: "OpenAI".into(),
                model: "gpt-4o-mini".into(),
            }]
        );
        assert_eq!(state.embedding_summaries()[0].model, "BAAI/bge-large-zh-v1.5");
    }
}
