//! Chat backend selection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use ragsage_core::{ProviderConfig, ProviderError};

use crate::model::ChatModel;
use crate::providers::{OllamaChat, OpenAiChat, QwenChat};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const MOONSHOT_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MOONSHOT_MODEL: &str = "moonshot-v1-8k";
pub const DEFAULT_ZHIPU_MODEL: &str = "glm-3-turbo";
pub const DEFAULT_QWEN_MODEL: &str = "qwen-turbo";

/// Chat vendor, named by its factory string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatBackend {
    #[serde(rename = "OpenAI")]
    OpenAi,
    #[serde(rename = "Moonshot")]
    Moonshot,
    #[serde(rename = "Xinference")]
    Xinference,
    #[serde(rename = "ZHIPU-AI")]
    ZhipuAi,
    #[serde(rename = "Tongyi-Qianwen")]
    Qwen,
    #[serde(rename = "Ollama")]
    Ollama,
}

impl ChatBackend {
    pub const ALL: [ChatBackend; 6] = [
        ChatBackend::OpenAi,
        ChatBackend::Moonshot,
        ChatBackend::Xinference,
        ChatBackend::ZhipuAi,
        ChatBackend::Qwen,
        ChatBackend::Ollama,
    ];

    pub fn factory_name(self) -> &'static str {
        match self {
            ChatBackend::OpenAi => "OpenAI",
            ChatBackend::Moonshot => "Moonshot",
            ChatBackend::Xinference => "Xinference",
            ChatBackend::ZhipuAi => "ZHIPU-AI",
            ChatBackend::Qwen => "Tongyi-Qianwen",
            ChatBackend::Ollama => "Ollama",
        }
    }

    /// Environment variable consulted when a record carries no credential.
    pub fn credential_env(self) -> Option<&'static str> {
        match self {
            ChatBackend::OpenAi => Some("OPENAI_API_KEY"),
            ChatBackend::Moonshot => Some("MOONSHOT_API_KEY"),
            ChatBackend::ZhipuAi => Some("ZHIPUAI_API_KEY"),
            ChatBackend::Qwen => Some("DASHSCOPE_API_KEY"),
            ChatBackend::Xinference | ChatBackend::Ollama => None,
        }
    }
}

impl std::fmt::Display for ChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.factory_name())
    }
}

impl std::str::FromStr for ChatBackend {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.factory_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProviderError::Config(format!("unknown chat factory: {}", s)))
    }
}

/// Build the chat model for `backend`. Resolved once per provider instance.
pub fn create_chat_model(
    backend: ChatBackend,
    config: &ProviderConfig,
) -> Result<Arc<dyn ChatModel>, ProviderError> {
    let model: Arc<dyn ChatModel> = match backend {
        ChatBackend::OpenAi
        | ChatBackend::Moonshot
        | ChatBackend::Xinference
        | ChatBackend::ZhipuAi => Arc::new(OpenAiChat::new(backend, config)?),
        ChatBackend::Qwen => Arc::new(QwenChat::new(config)?),
        ChatBackend::Ollama => Arc::new(OllamaChat::new(config)?),
    };
    info!("Chat model ready: {} ({})", backend, model.model_name());
    Ok(model)
}
