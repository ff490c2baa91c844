//! DashScope text-embedding (Tongyi-Qianwen).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_core::http::{build_client, read_json};
use ragsage_core::{ProviderConfig, ProviderError};

use crate::batch::{encode_in_batches, reorder_by_index, SubBatch};
use crate::config::{EmbeddingBackend, DASHSCOPE_BASE_URL, DEFAULT_QWEN_MODEL, REMOTE_MAX_CHARS};
use crate::model::EmbeddingModel;
use crate::types::{EmbeddingBatch, QueryEmbedding};

/// DashScope rejects more than this many texts per request.
const MAX_TEXTS_PER_CALL: usize = 10;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum TextType {
    Document,
    Query,
}

pub struct QwenEmbedding {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl QwenEmbedding {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.endpoint_or(DASHSCOPE_BASE_URL),
            api_key: config.credential.clone(),
            model: config.model_or(DEFAULT_QWEN_MODEL),
        })
    }

    async fn embed_chunk(
        &self,
        texts: Vec<String>,
        text_type: TextType,
    ) -> Result<SubBatch, ProviderError> {
        let url = format!(
            "{}/services/embeddings/text-embedding/text-embedding",
            self.base_url
        );
        debug!("POST {} model={} texts={}", url, self.model, texts.len());

        let request = EmbeddingRequest {
            model: &self.model,
            input: Input { texts: &texts },
            parameters: Parameters { text_type },
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: EmbeddingResponse = read_json(response).await?;

        let tagged = body
            .output
            .embeddings
            .into_iter()
            .map(|e| (e.text_index, e.embedding))
            .collect();
        Ok(SubBatch {
            vectors: reorder_by_index(tagged, texts.len())?,
            token_usage: body.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

#[async_trait]
impl EmbeddingModel for QwenEmbedding {
    fn backend(&self) -> EmbeddingBackend {
        EmbeddingBackend::Qwen
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
        let batch_size = batch_size.min(MAX_TEXTS_PER_CALL);
        encode_in_batches(texts, batch_size, REMOTE_MAX_CHARS, |chunk| {
            self.embed_chunk(chunk, TextType::Document)
        })
        .await
    }

    async fn encode_query(&self, text: &str) -> Result<QueryEmbedding, ProviderError> {
        let batch = encode_in_batches(&[text.to_string()], 1, REMOTE_MAX_CHARS, |chunk| {
            self.embed_chunk(chunk, TextType::Query)
        })
        .await?;
        QueryEmbedding::from_batch(batch)
    }
}

// -----------------------------------------------------------------------------
// Wire types
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Input<'a>,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Input<'a> {
    texts: &'a [String],
}

#[derive(Serialize)]
struct Parameters {
    text_type: TextType,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    output: Output,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct Output {
    #[serde(default)]
    embeddings: Vec<TaggedEmbedding>,
}

#[derive(Deserialize)]
struct TaggedEmbedding {
    text_index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    total_tokens: u64,
}
