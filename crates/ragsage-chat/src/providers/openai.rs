//! OpenAI-compatible chat completions (OpenAI, Moonshot, Xinference, ZHIPU-AI).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_core::http::{build_client, read_json};
use ragsage_core::{ProviderConfig, ProviderError};

use crate::config::{
    ChatBackend, DEFAULT_MOONSHOT_MODEL, DEFAULT_OPENAI_MODEL, DEFAULT_ZHIPU_MODEL,
    MOONSHOT_BASE_URL, OPENAI_BASE_URL, ZHIPU_BASE_URL,
};
use crate::model::ChatModel;
use crate::options::GenerationConfig;
use crate::types::{Completion, ConversationTurn, FinishReason};

/// Key sent to self-hosted servers that ignore authentication.
const PLACEHOLDER_KEY: &str = "xxx";

pub struct OpenAiChat {
    client: Client,
    backend: ChatBackend,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(backend: ChatBackend, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let (base_url, model) = match backend {
            ChatBackend::OpenAi => (
                config.endpoint_or(OPENAI_BASE_URL),
                config.model_or(DEFAULT_OPENAI_MODEL),
            ),
            ChatBackend::Moonshot => (
                config.endpoint_or(MOONSHOT_BASE_URL),
                config.model_or(DEFAULT_MOONSHOT_MODEL),
            ),
            ChatBackend::ZhipuAi => (
                config.endpoint_or(ZHIPU_BASE_URL),
                config.model_or(DEFAULT_ZHIPU_MODEL),
            ),
            ChatBackend::Xinference => {
                let url = config
                    .endpoint()
                    .ok_or_else(|| ProviderError::Config("Xinference requires an endpoint URL".into()))?;
                if config.model_name.trim().is_empty() {
                    return Err(ProviderError::Config("Xinference requires a model name".into()));
                }
                (url, config.model_name.clone())
            }
            other => {
                return Err(ProviderError::Config(format!(
                    "{} does not speak the OpenAI chat format",
                    other
                )))
            }
        };

        let api_key = if config.credential.is_empty() && backend == ChatBackend::Xinference {
            PLACEHOLDER_KEY.to_string()
        } else {
            config.credential.clone()
        };

        Ok(Self {
            client: build_client(config)?,
            backend,
            base_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn backend(&self) -> ChatBackend {
        self.backend
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &GenerationConfig,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            options,
        };

        debug!("POST {} model={}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body: ChatResponse = read_json(response).await?;
        let usage = body.usage.map(|u| u.total_tokens).unwrap_or(0);
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no choices in response".into()))?;

        Ok(Completion {
            answer: choice.message.content.unwrap_or_default(),
            finish_reason: FinishReason::from_vendor(choice.finish_reason.as_deref()),
            total_tokens: usage,
        })
    }
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    #[serde(flatten)]
    options: &'a GenerationConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    total_tokens: u64,
}
