//! Embedding backend selection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use ragsage_core::{ProviderConfig, ProviderError};

use crate::local::{LocalModelSpec, LocalModels};
use crate::model::EmbeddingModel;
use crate::providers::{LocalEmbedding, OllamaEmbedding, OpenAiEmbedding, QwenEmbedding};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_ZHIPU_MODEL: &str = "embedding-2";
pub const DEFAULT_QWEN_MODEL: &str = "text-embedding-v2";

/// Max characters submitted to a remote vendor.
pub const REMOTE_MAX_CHARS: usize = 2048;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Embedding vendor, named by its factory string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingBackend {
    #[serde(rename = "OpenAI")]
    OpenAi,
    #[serde(rename = "Xinference")]
    Xinference,
    #[serde(rename = "ZHIPU-AI")]
    ZhipuAi,
    #[serde(rename = "Tongyi-Qianwen")]
    Qwen,
    #[serde(rename = "Ollama")]
    Ollama,
    #[serde(rename = "BAAI")]
    Baai,
    #[serde(rename = "Youdao")]
    Youdao,
    #[serde(rename = "FastEmbed")]
    FastEmbed,
}

impl EmbeddingBackend {
    pub const ALL: [EmbeddingBackend; 8] = [
        EmbeddingBackend::OpenAi,
        EmbeddingBackend::Xinference,
        EmbeddingBackend::ZhipuAi,
        EmbeddingBackend::Qwen,
        EmbeddingBackend::Ollama,
        EmbeddingBackend::Baai,
        EmbeddingBackend::Youdao,
        EmbeddingBackend::FastEmbed,
    ];

    pub fn factory_name(self) -> &'static str {
        match self {
            EmbeddingBackend::OpenAi => "OpenAI",
            EmbeddingBackend::Xinference => "Xinference",
            EmbeddingBackend::ZhipuAi => "ZHIPU-AI",
            EmbeddingBackend::Qwen => "Tongyi-Qianwen",
            EmbeddingBackend::Ollama => "Ollama",
            EmbeddingBackend::Baai => "BAAI",
            EmbeddingBackend::Youdao => "Youdao",
            EmbeddingBackend::FastEmbed => "FastEmbed",
        }
    }

    pub fn is_local(self) -> bool {
        matches!(
            self,
            EmbeddingBackend::Baai | EmbeddingBackend::Youdao | EmbeddingBackend::FastEmbed
        )
    }

    /// Environment variable consulted when a record carries no credential.
    pub fn credential_env(self) -> Option<&'static str> {
        match self {
            EmbeddingBackend::OpenAi => Some("OPENAI_API_KEY"),
            EmbeddingBackend::ZhipuAi => Some("ZHIPUAI_API_KEY"),
            EmbeddingBackend::Qwen => Some("DASHSCOPE_API_KEY"),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.factory_name())
    }
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.factory_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProviderError::Config(format!("unknown embedding factory: {}", s)))
    }
}

/// Build the embedding model for `backend`. Local backends take their model
/// handle from `local`; nothing is loaded until the first encode.
pub fn create_embedding_model(
    backend: EmbeddingBackend,
    config: &ProviderConfig,
    local: &LocalModels,
) -> Result<Arc<dyn EmbeddingModel>, ProviderError> {
    let model: Arc<dyn EmbeddingModel> = match backend {
        EmbeddingBackend::OpenAi | EmbeddingBackend::Xinference | EmbeddingBackend::ZhipuAi => {
            Arc::new(OpenAiEmbedding::new(backend, config)?)
        }
        EmbeddingBackend::Qwen => Arc::new(QwenEmbedding::new(config)?),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedding::new(config)?),
        EmbeddingBackend::Baai | EmbeddingBackend::Youdao | EmbeddingBackend::FastEmbed => {
            let mut spec = match backend {
                EmbeddingBackend::Baai => LocalModelSpec::bge(),
                EmbeddingBackend::Youdao => LocalModelSpec::bce(&config.model_name),
                _ => LocalModelSpec::fastembed(&config.model_name),
            };
            // Absolute paths replace the models directory entirely
            if let Some(dir) = config.extra_str("model_dir") {
                spec.local_dir = dir.to_string();
            }
            Arc::new(LocalEmbedding::new(backend, local.shared(&spec), spec))
        }
    };
    info!("Embedding model ready: {} ({})", backend, model.model_name());
    Ok(model)
}
