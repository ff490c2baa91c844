//! OpenAI-compatible `/embeddings` (OpenAI, Xinference, ZHIPU-AI).

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_core::http::{build_client, read_json};
use ragsage_core::{ProviderConfig, ProviderError};

use crate::batch::{encode_in_batches, reorder_by_index, SubBatch};
use crate::config::{
    EmbeddingBackend, DEFAULT_OPENAI_MODEL, DEFAULT_ZHIPU_MODEL, OPENAI_BASE_URL,
    REMOTE_MAX_CHARS, ZHIPU_BASE_URL,
};
use crate::model::EmbeddingModel;
use crate::types::{EmbeddingBatch, QueryEmbedding};

const PLACEHOLDER_KEY: &str = "xxx";

/// How texts are submitted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    /// One request per sub-batch with an `input` array.
    Batch,
    /// One request per text; ZHIPU-AI accepts a single input only.
    PerText,
}

pub struct OpenAiEmbedding {
    client: Client,
    backend: EmbeddingBackend,
    base_url: String,
    api_key: String,
    model: String,
    mode: InputMode,
}

impl OpenAiEmbedding {
    pub fn new(backend: EmbeddingBackend, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let (base_url, model, mode) = match backend {
            EmbeddingBackend::OpenAi => (
                config.endpoint_or(OPENAI_BASE_URL),
                config.model_or(DEFAULT_OPENAI_MODEL),
                InputMode::Batch,
            ),
            EmbeddingBackend::ZhipuAi => (
                config.endpoint_or(ZHIPU_BASE_URL),
                config.model_or(DEFAULT_ZHIPU_MODEL),
                InputMode::PerText,
            ),
            EmbeddingBackend::Xinference => {
                let url = config.endpoint().ok_or_else(|| {
                    ProviderError::Config("Xinference requires an endpoint URL".into())
                })?;
                if config.model_name.trim().is_empty() {
                    return Err(ProviderError::Config("Xinference requires a model name".into()));
                }
                (url, config.model_name.clone(), InputMode::Batch)
            }
            other => {
                return Err(ProviderError::Config(format!(
                    "{} does not speak the OpenAI embeddings format",
                    other
                )))
            }
        };

        let api_key = if config.credential.is_empty() && backend == EmbeddingBackend::Xinference {
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
            mode,
        })
    }

    async fn call(&self, input: EmbeddingInput<'_>) -> Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/embeddings", self.base_url);
        debug!("POST {} model={}", url, self.model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await?;
        read_json(response).await
    }

    async fn embed_chunk(&self, chunk: Vec<String>) -> Result<SubBatch, ProviderError> {
        match self.mode {
            InputMode::Batch => {
                let expected = chunk.len();
                let body = self.call(EmbeddingInput::Many(&chunk)).await?;
                let usage = body.total_tokens();
                let tagged = body
                    .data
                    .into_iter()
                    .enumerate()
                    .map(|(pos, item)| (item.index.unwrap_or(pos), item.embedding))
                    .collect();
                Ok(SubBatch {
                    vectors: reorder_by_index(tagged, expected)?,
                    token_usage: usage,
                })
            }
            InputMode::PerText => {
                let mut sub = SubBatch::default();
                for text in &chunk {
                    let body = self.call(EmbeddingInput::One(text)).await?;
                    sub.token_usage += body.total_tokens();
                    let item = body.data.into_iter().next().ok_or_else(|| {
                        ProviderError::Malformed("no embedding in response".into())
                    })?;
                    sub.vectors.push(Array1::from_vec(item.embedding));
                }
                Ok(sub)
            }
        }
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbedding {
    fn backend(&self) -> EmbeddingBackend {
        self.backend
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_input_chars(&self) -> usize {
        REMOTE_MAX_CHARS
    }

    async fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<EmbeddingBatch, ProviderError> {
        encode_in_batches(texts, batch_size, REMOTE_MAX_CHARS, |chunk| {
            self.embed_chunk(chunk)
        })
        .await
    }

    async fn encode_query(&self, text: &str) -> Result<QueryEmbedding, ProviderError> {
        let batch = self.encode(&[text.to_string()], 1).await?;
        QueryEmbedding::from_batch(batch)
    }
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    One(&'a str),
    Many(&'a [String]),
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl EmbeddingResponse {
    fn total_tokens(&self) -> u64 {
        self.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
    }
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Answers with the inputs' positions in reverse order; each vector holds
    /// the input's length so the caller can check placement.
    struct ReversedEmbeddings;

    impl Respond for ReversedEmbeddings {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = request.body_json().unwrap();
            let inputs: Vec<String> = serde_json::from_value(body["input"].clone()).unwrap();
            let data: Vec<Value> = inputs
                .iter()
                .enumerate()
                .rev()
                .map(|(i, t)| json!({"index": i, "embedding": [t.chars().count() as f32]}))
                .collect();
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": data, "usage": {"total_tokens": inputs.len()}}))
        }
    }

    fn openai(server: &MockServer) -> OpenAiEmbedding {
        let config = ProviderConfig::new("sk-test", "").with_endpoint(server.uri());
        OpenAiEmbedding::new(EmbeddingBackend::OpenAi, &config).unwrap()
    }

    #[tokio::test]
    async fn test_out_of_order_results_are_placed_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ReversedEmbeddings)
            .mount(&server)
            .await;

        let texts: Vec<String> = (1..=5).map(|n| "x".repeat(n)).collect();
        let batch = openai(&server).encode(&texts, 2).await.unwrap();

        let lengths: Vec<f32> = batch.vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(batch.token_usage, 5);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_request_uses_default_model_and_truncates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ReversedEmbeddings)
            .mount(&server)
            .await;

        let batch = openai(&server)
            .encode(&["y".repeat(5000)], 16)
            .await
            .unwrap();
        assert_eq!(batch.vectors[0][0], REMOTE_MAX_CHARS as f32);

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["model"], DEFAULT_OPENAI_MODEL);
    }

    #[tokio::test]
    async fn test_zhipu_sends_one_text_per_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}],
                "usage": {"total_tokens": 3}
            })))
            .mount(&server)
            .await;

        let config = ProviderConfig::new("zp-key", "").with_endpoint(server.uri());
        let model = OpenAiEmbedding::new(EmbeddingBackend::ZhipuAi, &config).unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let batch = model.encode(&texts, 32).await.unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.token_usage, 9);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        let body: Value = requests[1].body_json().unwrap();
        assert_eq!(body["input"], "b");
        assert_eq!(body["model"], DEFAULT_ZHIPU_MODEL);
    }

    #[tokio::test]
    async fn test_short_answer_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = openai(&server).encode(&texts, 8).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "Incorrect API key"}})),
            )
            .mount(&server)
            .await;

        let err = openai(&server).encode_query("hello").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Authentication {
                status: 401,
                message: "Incorrect API key".into()
            }
        );
    }

    #[tokio::test]
    async fn test_xinference_placeholder_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer xxx"))
            .respond_with(ReversedEmbeddings)
            .mount(&server)
            .await;

        let config = ProviderConfig::new("", "bge-base-en").with_endpoint(server.uri());
        let model = OpenAiEmbedding::new(EmbeddingBackend::Xinference, &config).unwrap();
        let query = model.encode_query("abc").await.unwrap();
        assert_eq!(query.vector[0], 3.0);
        assert_eq!(query.token_usage, 1);
    }
}
