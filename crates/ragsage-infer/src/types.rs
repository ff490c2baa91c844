//! Embedding results.

use ndarray::Array1;
use ragsage_core::ProviderError;

/// Vectors for a batch of texts, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Array1<f32>>,
    /// Summed over every upstream call. Estimated for vendors that do not
    /// report usage.
    pub token_usage: u64,
}

impl EmbeddingBatch {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Vector for a single query text.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    pub vector: Array1<f32>,
    pub token_usage: u64,
}

impl QueryEmbedding {
    /// Take the single vector of a one-text batch.
    pub fn from_batch(batch: EmbeddingBatch) -> Result<Self, ProviderError> {
        let token_usage = batch.token_usage;
        let mut vectors = batch.vectors.into_iter();
        match (vectors.next(), vectors.next()) {
            (Some(vector), None) => Ok(Self {
                vector,
                token_usage,
            }),
            _ => Err(ProviderError::Malformed(
                "expected exactly one query embedding".into(),
            )),
        }
    }
}
