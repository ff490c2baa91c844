//! Locally hosted models behind an Ollama server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_core::http::{build_client, read_json};
use ragsage_core::{ProviderConfig, ProviderError};

use crate::config::ChatBackend;
use crate::model::ChatModel;
use crate::options::{GenOption, GenerationConfig};
use crate::types::{Completion, ConversationTurn, FinishReason};

/// Values sent when the caller leaves an option unset.
const DEFAULT_OPTIONS: [(GenOption, f64); 5] = [
    (GenOption::Temperature, 0.1),
    (GenOption::MaxTokens, 128.0),
    (GenOption::TopP, 0.3),
    (GenOption::PresencePenalty, 0.4),
    (GenOption::FrequencyPenalty, 0.7),
];

fn option_name(option: GenOption) -> &'static str {
    match option {
        GenOption::MaxTokens => "num_predict",
        other => other.key(),
    }
}

pub struct OllamaChat {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let base_url = config
            .endpoint()
            .ok_or_else(|| ProviderError::Config("Ollama requires an endpoint URL".into()))?;
        if config.model_name.trim().is_empty() {
            return Err(ProviderError::Config("Ollama requires a model name".into()));
        }
        Ok(Self {
            client: build_client(config)?,
            base_url,
            model: config.model_name.clone(),
        })
    }

    fn options(&self, conf: &GenerationConfig) -> BTreeMap<&'static str, serde_json::Value> {
        DEFAULT_OPTIONS
            .iter()
            .map(|(option, default)| {
                let value = conf.get(*option).unwrap_or(*default);
                (option_name(*option), option.json_value(value))
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn backend(&self) -> ChatBackend {
        ChatBackend::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &GenerationConfig,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: self.options(options),
        };

        debug!("POST {} model={}", url, self.model);

        let response = self.client.post(&url).json(&request).send().await?;
        let body: OllamaChatResponse = read_json(response).await?;

        Ok(Completion {
            answer: body.message.content,
            finish_reason: FinishReason::from_vendor(body.done_reason.as_deref()),
            total_tokens: body.prompt_eval_count + body.eval_count,
        })
    }
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    stream: bool,
    options: BTreeMap<&'static str, serde_json::Value>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::ENGLISH_NOTICE;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_for(server: &MockServer) -> OllamaChat {
        OllamaChat::new(&ProviderConfig::new("", "llama3").with_endpoint(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_options_renamed_with_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "message": {"role": "assistant", "content": " Sure. "},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 26,
                "eval_count": 4
            })))
            .mount(&server)
            .await;

        let conf = GenerationConfig::new()
            .with(GenOption::Temperature, 0.9)
            .with(GenOption::MaxTokens, 512.0);
        let result = model_for(&server)
            .chat("", &[ConversationTurn::user("hi")], &conf)
            .await;
        assert_eq!(result.answer, "Sure.");
        assert_eq!(result.token_usage, 30);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.9);
        assert_eq!(body["options"]["num_predict"], 512);
        assert_eq!(body["options"]["top_p"], 0.3);
        assert_eq!(body["options"]["presence_penalty"], 0.4);
        assert_eq!(body["options"]["frequency_penalty"], 0.7);
        assert!(body["options"].get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_done_reason_length() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "Once upon a time"},
                "done_reason": "length",
                "prompt_eval_count": 5,
                "eval_count": 128
            })))
            .mount(&server)
            .await;

        let result = model_for(&server)
            .chat("", &[ConversationTurn::user("story")], &GenerationConfig::new())
            .await;
        assert!(result.answer.ends_with(ENGLISH_NOTICE));
    }

    #[tokio::test]
    async fn test_missing_done_reason_skips_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "Once upon a time"}
            })))
            .mount(&server)
            .await;

        let result = model_for(&server)
            .chat("", &[ConversationTurn::user("story")], &GenerationConfig::new())
            .await;
        assert_eq!(result.answer, "Once upon a time");
        assert_eq!(result.token_usage, 0);
    }

    #[tokio::test]
    async fn test_model_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model \"llama3\" not found"})),
            )
            .mount(&server)
            .await;

        let result = model_for(&server)
            .chat("", &[ConversationTurn::user("hi")], &GenerationConfig::new())
            .await;
        assert!(result.is_error());
        assert!(result.answer.contains("not found"));
    }
}
