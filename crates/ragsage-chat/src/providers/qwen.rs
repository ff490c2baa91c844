//! Tongyi-Qianwen chat over the DashScope text-generation API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_core::http::{build_client, read_json};
use ragsage_core::{ProviderConfig, ProviderError};

use crate::config::{ChatBackend, DASHSCOPE_BASE_URL, DEFAULT_QWEN_MODEL};
use crate::model::ChatModel;
use crate::options::GenerationConfig;
use crate::types::{Completion, ConversationTurn, FinishReason};

const GENERATION_PATH: &str = "/services/aigc/text-generation/generation";

pub struct QwenChat {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl QwenChat {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.endpoint_or(DASHSCOPE_BASE_URL),
            api_key: config.credential.clone(),
            model: config.model_or(DEFAULT_QWEN_MODEL),
        })
    }
}

#[async_trait]
impl ChatModel for QwenChat {
    fn backend(&self) -> ChatBackend {
        ChatBackend::Qwen
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &GenerationConfig,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}{}", self.base_url, GENERATION_PATH);
        let request = GenerationRequest {
            model: &self.model,
            input: Input { messages },
            parameters: Parameters {
                result_format: "message",
                options,
            },
        };

        debug!("POST {} model={}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let body: GenerationResponse = read_json(response).await?;
        let usage = body.usage.map(|u| u.total()).unwrap_or(0);
        let choice = body
            .output
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no choices in output".into()))?;

        Ok(Completion {
            answer: choice.message.content,
            finish_reason: FinishReason::from_vendor(choice.finish_reason.as_deref()),
            total_tokens: usage,
        })
    }
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: Input<'a>,
    parameters: Parameters<'a>,
}

#[derive(Serialize)]
struct Input<'a> {
    messages: &'a [ConversationTurn],
}

#[derive(Serialize)]
struct Parameters<'a> {
    result_format: &'static str,
    #[serde(flatten)]
    options: &'a GenerationConfig,
}

#[derive(Deserialize)]
struct GenerationResponse {
    output: Output,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Output {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl Usage {
    fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or(self.input_tokens + self.output_tokens)
    }
}
