//! Sub-batching, input truncation and result re-ordering.

use std::future::Future;

use ndarray::Array1;
use ragsage_core::ProviderError;

use crate::types::EmbeddingBatch;

/// Outcome of one upstream call, already in chunk order.
#[derive(Debug, Default)]
pub struct SubBatch {
    pub vectors: Vec<Array1<f32>>,
    pub token_usage: u64,
}

/// Cut `text` to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Split `texts` into contiguous chunks of `batch_size`, truncate each text
/// to `max_chars`, run `call` per chunk in order and concatenate.
///
/// An empty input returns an empty batch without calling `call`. The first
/// failing chunk aborts the whole batch.
pub async fn encode_in_batches<F, Fut>(
    texts: &[String],
    batch_size: usize,
    max_chars: usize,
    mut call: F,
) -> Result<EmbeddingBatch, ProviderError>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<SubBatch, ProviderError>>,
{
    if batch_size == 0 {
        return Err(ProviderError::InvalidRequest("batch size must be positive".into()));
    }

    let mut result = EmbeddingBatch {
        vectors: Vec::with_capacity(texts.len()),
        token_usage: 0,
    };

    for chunk in texts.chunks(batch_size) {
        let inputs: Vec<String> = chunk
            .iter()
            .map(|t| truncate_chars(t, max_chars).to_string())
            .collect();
        let expected = inputs.len();

        let sub = call(inputs).await?;
        if sub.vectors.len() != expected {
            return Err(ProviderError::Malformed(format!(
                "expected {} embeddings, got {}",
                expected,
                sub.vectors.len()
            )));
        }
        result.vectors.extend(sub.vectors);
        result.token_usage += sub.token_usage;
    }

    Ok(result)
}

/// Place vendor results tagged with their position within the chunk.
///
/// Every position in `0..expected` must appear exactly once.
pub fn reorder_by_index(
    items: Vec<(usize, Vec<f32>)>,
    expected: usize,
) -> Result<Vec<Array1<f32>>, ProviderError> {
    if items.len() != expected {
        return Err(ProviderError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            items.len()
        )));
    }

    let mut slots: Vec<Option<Array1<f32>>> = vec![None; expected];
    for (index, embedding) in items {
        let slot = slots.get_mut(index).ok_or_else(|| {
            ProviderError::Malformed(format!("embedding index {} out of range", index))
        })?;
        if slot.is_some() {
            return Err(ProviderError::Malformed(format!(
                "duplicate embedding index {}",
                index
            )));
        }
        *slot = Some(Array1::from_vec(embedding));
    }

    // count matches and no duplicates, so every slot is filled
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::cell::RefCell;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text-{}", i)).collect()
    }

    /// Fake vendor: one-element vector holding the text's numeric suffix.
    fn fake_vector(text: &str) -> Array1<f32> {
        let n: f32 = text.trim_start_matches("text-").parse().unwrap();
        array![n]
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("检索增强生成", 2), "检索");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[tokio::test]
    async fn test_order_preserved_for_all_batch_sizes() {
        let input = texts(7);
        for batch_size in [1, 3, 7, 107] {
            let calls = RefCell::new(Vec::new());
            let batch = encode_in_batches(&input, batch_size, 2048, |chunk| {
                calls.borrow_mut().push(chunk.len());
                async move {
                    Ok(SubBatch {
                        vectors: chunk.iter().map(|t| fake_vector(t)).collect(),
                        token_usage: chunk.len() as u64,
                    })
                }
            })
            .await
            .unwrap();

            assert_eq!(batch.len(), 7);
            for (i, v) in batch.vectors.iter().enumerate() {
                assert_eq!(v[0], i as f32);
            }
            assert_eq!(batch.token_usage, 7);
            assert_eq!(calls.borrow().len(), (7 + batch_size - 1) / batch_size);
        }
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let called = std::cell::Cell::new(false);
        let batch = encode_in_batches(&[], 32, 2048, |_chunk| {
            called.set(true);
            async { Ok(SubBatch::default()) }
        })
        .await
        .unwrap();
        assert!(!called.get());
        assert!(batch.is_empty());
        assert_eq!(batch.token_usage, 0);
    }

    #[tokio::test]
    async fn test_long_text_truncated_before_call() {
        let input = vec!["a".repeat(5000), "short".to_string()];
        let seen = RefCell::new(Vec::new());
        encode_in_batches(&input, 8, 2000, |chunk| {
            seen.borrow_mut().extend(chunk.iter().map(|t| t.chars().count()));
            let n = chunk.len();
            async move {
                Ok(SubBatch {
                    vectors: vec![array![0.0]; n],
                    token_usage: 0,
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.borrow(), vec![2000, 5]);
    }

    #[tokio::test]
    async fn test_failing_chunk_aborts() {
        let input = texts(4);
        let result = encode_in_batches(&input, 2, 2048, |chunk| async move {
            if chunk[0] == "text-2" {
                Err(ProviderError::Transport("reset".into()))
            } else {
                Ok(SubBatch {
                    vectors: chunk.iter().map(|t| fake_vector(t)).collect(),
                    token_usage: 1,
                })
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), ProviderError::Transport("reset".into()));
    }

    #[tokio::test]
    async fn test_short_vendor_answer_rejected() {
        let input = texts(3);
        let result = encode_in_batches(&input, 3, 2048, |_chunk| async {
            Ok(SubBatch {
                vectors: vec![array![1.0]],
                token_usage: 0,
            })
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let result = encode_in_batches(&texts(1), 0, 2048, |_chunk| async {
            Ok(SubBatch::default())
        })
        .await;
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    #[test]
    fn test_reorder_by_index() {
        let items = vec![(2, vec![2.0]), (0, vec![0.0]), (1, vec![1.0])];
        let ordered = reorder_by_index(items, 3).unwrap();
        assert_eq!(ordered, vec![array![0.0], array![1.0], array![2.0]]);
    }

    #[test]
    fn test_reorder_rejects_bad_tags() {
        let dup = vec![(0, vec![0.0]), (0, vec![1.0])];
        assert!(reorder_by_index(dup, 2).is_err());

        let out_of_range = vec![(0, vec![0.0]), (5, vec![1.0])];
        assert!(reorder_by_index(out_of_range, 2).is_err());

        let short = vec![(0, vec![0.0])];
        assert!(reorder_by_index(short, 2).is_err());
    }
}
