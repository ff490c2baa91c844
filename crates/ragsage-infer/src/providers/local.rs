//! Embedding models hosted in-process (BAAI, Youdao, FastEmbed).

use std::sync::Arc;

use async_trait::async_trait;
use ragsage_core::ProviderError;

use crate::batch::{encode_in_batches, SubBatch};
use crate::config::EmbeddingBackend;
use crate::local::{LocalModelSpec, SharedModel, LOCAL_MAX_CHARS};
use crate::model::EmbeddingModel;
use crate::types::{EmbeddingBatch, QueryEmbedding};

pub struct LocalEmbedding {
    backend: EmbeddingBackend,
    shared: Arc<SharedModel>,
    spec: LocalModelSpec,
}

impl LocalEmbedding {
    pub fn new(backend: EmbeddingBackend, shared: Arc<SharedModel>, spec: LocalModelSpec) -> Self {
        Self {
            backend,
            shared,
            spec,
        }
    }

    /// Load (first call only) and run the model off the async runtime.
    async fn embed_chunk(&self, chunk: Vec<String>) -> Result<SubBatch, ProviderError> {
        let shared = self.shared.clone();
        tokio::task::spawn_blocking(move || -> Result<SubBatch, ProviderError> {
            let encoder = shared.get()?;
            let token_usage = chunk
                .iter()
                .map(|t| encoder.count_tokens(t) as u64)
                .sum::<u64>();
            Ok(SubBatch {
                vectors: encoder.encode(&chunk)?,
                token_usage,
            })
        })
        .await
        .map_err(|e| ProviderError::InferenceTask(e.to_string()))?
    }
}

#[async_trait]
impl EmbeddingModel for LocalEmbedding {
    fn backend(&self) -> EmbeddingBackend {
        self.backend
    }

    fn model_name(&self) -> &str {
        &self.spec.model_id
    }

    fn max_input_chars(&self) -> usize {
        LOCAL_MAX_CHARS
    }

    async fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<EmbeddingBatch, ProviderError> {
        encode_in_batches(texts, batch_size, LOCAL_MAX_CHARS, |chunk| {
            self.embed_chunk(chunk)
        })
        .await
    }

    async fn encode_query(&self, text: &str) -> Result<QueryEmbedding, ProviderError> {
        let query = match &self.spec.query_instruction {
            Some(instruction) => format!("{}{}", instruction, text),
            None => text.to_string(),
        };
        let batch = self.encode(&[query], 1).await?;
        QueryEmbedding::from_batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalEncoder, LocalModels, BGE_QUERY_INSTRUCTION};
    use ndarray::Array1;
    use parking_lot::Mutex;

    /// Records what it was asked to encode; vector = [char count].
    struct RecordingEncoder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl LocalEncoder for RecordingEncoder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, ProviderError> {
            self.seen.lock().extend(texts.iter().cloned());
            Ok(texts
                .iter()
                .map(|t| Array1::from_vec(vec![t.chars().count() as f32]))
                .collect())
        }

        fn count_tokens(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn bge_with(seen: Arc<Mutex<Vec<String>>>) -> LocalEmbedding {
        let pool = LocalModels::new("/models", move |_source| {
            Ok(Arc::new(RecordingEncoder { seen: seen.clone() }) as Arc<dyn LocalEncoder>)
        });
        let spec = LocalModelSpec::bge();
        LocalEmbedding::new(EmbeddingBackend::Baai, pool.shared(&spec), spec)
    }

    #[tokio::test]
    async fn test_query_gets_instruction_prefix() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = bge_with(seen.clone());

        let query = model.encode_query("什么是向量检索").await.unwrap();
        let expected = format!("{}什么是向量检索", BGE_QUERY_INSTRUCTION);
        assert_eq!(seen.lock().as_slice(), &[expected.clone()]);
        assert_eq!(query.token_usage, expected.chars().count() as u64);
    }

    #[tokio::test]
    async fn test_documents_truncated_and_counted() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let model = bge_with(seen.clone());

        let texts = vec!["字".repeat(3000), "short".to_string()];
        let batch = model.encode(&texts, 1).await.unwrap();
        assert_eq!(batch.vectors[0][0], LOCAL_MAX_CHARS as f32);
        assert_eq!(batch.vectors[1][0], 5.0);
        assert_eq!(batch.token_usage, (LOCAL_MAX_CHARS + 5) as u64);
    }

    #[tokio::test]
    async fn test_init_failure_propagates() {
        let pool = LocalModels::new("/models", |_source| {
            Err(ProviderError::ResourceInit("no weights".into()))
        });
        let spec = LocalModelSpec::bce("");
        let model = LocalEmbedding::new(EmbeddingBackend::Youdao, pool.shared(&spec), spec);

        let err = model.encode(&["text".to_string()], 4).await.unwrap_err();
        assert!(matches!(err, ProviderError::ResourceInit(_)));
        assert!(model.encode(&[], 4).await.unwrap().is_empty());
    }

    struct PanickingEncoder;

    impl LocalEncoder for PanickingEncoder {
        fn encode(&self, _texts: &[String]) -> Result<Vec<Array1<f32>>, ProviderError> {
            panic!("session poisoned");
        }

        fn count_tokens(&self, _text: &str) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_panicked_task_is_not_a_vendor_error() {
        let pool = LocalModels::new("/models", |_source| {
            Ok(Arc::new(PanickingEncoder) as Arc<dyn LocalEncoder>)
        });
        let spec = LocalModelSpec::fastembed("");
        let model = LocalEmbedding::new(EmbeddingBackend::FastEmbed, pool.shared(&spec), spec);

        let err = model.encode(&["text".to_string()], 4).await.unwrap_err();
        assert!(matches!(err, ProviderError::InferenceTask(_)));
        assert!(err.to_string().starts_with("local inference failed"));
    }
}
