//! Ollama `/api/embeddings`.

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_core::http::{build_client, read_json};
use ragsage_core::{ProviderConfig, ProviderError};

use crate::batch::{encode_in_batches, SubBatch};
use crate::config::{EmbeddingBackend, REMOTE_MAX_CHARS};
use crate::model::EmbeddingModel;
use crate::types::{EmbeddingBatch, QueryEmbedding};

/// Ollama reports no usage; each call is counted as this many tokens.
pub const OLLAMA_TOKENS_PER_CALL: u64 = 128;

pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedding {
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

    async fn embed_one(&self, prompt: &str) -> Result<Array1<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        debug!("POST {} model={}", url, self.model);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt,
            })
            .send()
            .await?;
        let body: EmbeddingResponse = read_json(response).await?;
        if body.embedding.is_empty() {
            return Err(ProviderError::Malformed("empty embedding".into()));
        }
        Ok(Array1::from_vec(body.embedding))
    }

    async fn embed_chunk(&self, chunk: Vec<String>) -> Result<SubBatch, ProviderError> {
        let mut sub = SubBatch::default();
        for text in &chunk {
            sub.vectors.push(self.embed_one(text).await?);
            sub.token_usage += OLLAMA_TOKENS_PER_CALL;
        }
        Ok(sub)
    }
}

#[async_trait]
impl EmbeddingModel for OllamaEmbedding {
    fn backend(&self) -> EmbeddingBackend {
        EmbeddingBackend::Ollama
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

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}
