//! The embedding capability shared by every vendor adapter.

use async_trait::async_trait;
use ragsage_core::ProviderError;

use crate::config::EmbeddingBackend;
use crate::types::{EmbeddingBatch, QueryEmbedding};

/// Uniform embedding interface over vendor backends.
///
/// Unlike chat, failures are returned to the caller: a batch either yields
/// one vector per input text, in input order, or an error.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn backend(&self) -> EmbeddingBackend;

    fn model_name(&self) -> &str;

    /// Longest input (in characters) submitted upstream; longer texts are
    /// cut to this length.
    fn max_input_chars(&self) -> usize;

    /// Embed `texts` in contiguous sub-batches of `batch_size`.
    async fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<EmbeddingBatch, ProviderError>;

    /// Embed a single retrieval query.
    async fn encode_query(&self, text: &str) -> Result<QueryEmbedding, ProviderError>;
}
