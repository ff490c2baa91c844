//! ONNX Runtime encoder for BERT-family sentence embedding models.
//!
//! Loads `model.onnx` (or `onnx/model.onnx`) plus `tokenizer.json` from a
//! directory, or fetches the same files from the Hugging Face hub. Output
//! vectors are CLS-pooled and L2-normalized. Requires the `onnx` feature.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use ndarray::Array1;
use once_cell::sync::OnceCell;
use ort::environment::Environment;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use ragsage_core::ProviderError;
use tokenizers::Tokenizer;
use tracing::info;

use super::{LocalEncoder, ModelSource};

/// BERT exports take this input; XLM-R style exports (bce) do not.
const TOKEN_TYPE_INPUT: &str = "token_type_ids";

/// Maximum sequence length for BERT-style position embeddings.
const MAX_SEQ_LEN: usize = 512;

const INTRA_THREADS: usize = 2;

/// ONNX Runtime allows one environment per process.
static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

fn environment() -> Result<&'static Environment, ProviderError> {
    // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime
    ENVIRONMENT.get_or_try_init(|| {
        ort::init()
            .with_name("ragsage")
            .build()
            .map_err(|e| init_err(format!("failed to create ONNX Runtime environment: {}", e)))
    })
}

pub struct OnnxEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    uses_token_types: bool,
}

fn init_err(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::ResourceInit(e.to_string())
}

fn infer_err(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::InferenceTask(e.to_string())
}

impl OnnxEncoder {
    pub fn load(source: &ModelSource) -> Result<Self, ProviderError> {
        let (model_path, tokenizer_path) = match source {
            ModelSource::Directory(dir) => Self::local_files(dir)?,
            ModelSource::Hub(id) => Self::hub_files(id)?,
        };

        let session = Session::builder(environment()?)
            .map_err(|e| init_err(format!("failed to create session builder: {}", e)))?
            .with_intra_threads(INTRA_THREADS)
            .map_err(|e| init_err(format!("failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| init_err(format!("failed to load ONNX model: {}", e)))?;

        let uses_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == TOKEN_TYPE_INPUT);

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| init_err(format!("failed to load tokenizer: {}", e)))?;

        info!("ONNX encoder loaded from {}", model_path.display());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            uses_token_types,
        })
    }

    fn local_files(dir: &Path) -> Result<(PathBuf, PathBuf), ProviderError> {
        let model_path = [dir.join("model.onnx"), dir.join("onnx").join("model.onnx")]
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| init_err(format!("model not found in {}", dir.display())))?;
        let tokenizer_path = dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(init_err(format!(
                "tokenizer not found: {}",
                tokenizer_path.display()
            )));
        }
        Ok((model_path, tokenizer_path))
    }

    fn hub_files(model_id: &str) -> Result<(PathBuf, PathBuf), ProviderError> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| init_err(format!("failed to create hub client: {}", e)))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let model_path = repo
            .get("onnx/model.onnx")
            .or_else(|_| repo.get("model.onnx"))
            .map_err(|e| init_err(format!("failed to fetch {} weights: {}", model_id, e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| init_err(format!("failed to fetch {} tokenizer: {}", model_id, e)))?;
        Ok((model_path, tokenizer_path))
    }
}

impl LocalEncoder for OnnxEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(infer_err)?;

        let batch = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(MAX_SEQ_LEN))
            .max()
            .unwrap_or(0)
            .max(1);

        // Pad every row to seq_len, truncating at MAX_SEQ_LEN
        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            let row_ids = encoding.get_ids().iter().take(seq_len);
            let row_mask = encoding.get_attention_mask().iter().take(seq_len);
            let used = row_ids.len();
            ids.extend(row_ids.map(|&id| id as i64));
            mask.extend(row_mask.map(|&m| m as i64));
            ids.extend(std::iter::repeat(0i64).take(seq_len - used));
            mask.extend(std::iter::repeat(0i64).take(seq_len - used));
        }
        let type_ids = vec![0i64; batch * seq_len];

        let ids_tensor = Tensor::from_array(([batch, seq_len], ids)).map_err(infer_err)?;
        let mask_tensor = Tensor::from_array(([batch, seq_len], mask)).map_err(infer_err)?;

        let mut session = self.session.lock();
        let outputs = if self.uses_token_types {
            let type_ids_tensor =
                Tensor::from_array(([batch, seq_len], type_ids)).map_err(infer_err)?;
            session.run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
        } else {
            session.run(ort::inputs![ids_tensor, mask_tensor])
        }
        .map_err(infer_err)?;

        // [batch, seq_len, dim] token states or [batch, dim] pooled output
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(infer_err)?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let (dim, row_stride) = match dims.as_slice() {
            [_, seq, dim] => (*dim as usize, *seq as usize * *dim as usize),
            [_, dim] => (*dim as usize, *dim as usize),
            other => return Err(infer_err(format!("unexpected output shape {:?}", other))),
        };

        // CLS token sits at position 0 of each row
        Ok((0..batch)
            .map(|row| {
                let start = row * row_stride;
                normalize(Array1::from_vec(data[start..start + dim].to_vec()))
            })
            .collect())
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer
            .encode(text, false)
            .map(|e| e.get_ids().len())
            .unwrap_or(0)
    }
}

fn normalize(v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm < 1e-12 {
        v
    } else {
        v / norm
    }
}
