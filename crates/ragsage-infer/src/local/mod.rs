//! Locally hosted embedding models.
//!
//! Heavy models are loaded at most once per process through a
//! [`SharedModel`]. [`LocalModels`] owns one handle per model and is passed
//! to the embedding factory; nothing here is a global.

#[cfg(feature = "onnx")]
pub mod onnx;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array1;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use ragsage_core::ProviderError;
use tracing::{info, warn};

/// Query prefix the BGE models were trained with.
pub const BGE_QUERY_INSTRUCTION: &str = "为这个句子生成表示以用于检索相关文章：";

/// Max characters submitted to a local model.
pub const LOCAL_MAX_CHARS: usize = 2000;

/// A loaded local embedding model. Inference is synchronous.
pub trait LocalEncoder: Send + Sync {
    fn encode(&self, texts: &[String]) -> Result<Vec<Array1<f32>>, ProviderError>;

    fn count_tokens(&self, text: &str) -> usize;
}

/// Where to load model weights from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Bundled asset directory.
    Directory(PathBuf),
    /// Published model identifier on the Hugging Face hub.
    Hub(String),
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSource::Directory(dir) => write!(f, "{}", dir.display()),
            ModelSource::Hub(id) => write!(f, "hub:{}", id),
        }
    }
}

pub type LoadFn = dyn Fn(&ModelSource) -> Result<Arc<dyn LocalEncoder>, ProviderError> + Send + Sync;

/// Process-wide handle to one heavy model, loaded on first use.
///
/// Concurrent first callers block on a single load. The outcome, success or
/// final failure, is kept for the life of the handle.
pub struct SharedModel {
    name: String,
    primary: ModelSource,
    fallback: Option<ModelSource>,
    loader: Arc<LoadFn>,
    cell: OnceCell<Result<Arc<dyn LocalEncoder>, ProviderError>>,
}

impl SharedModel {
    pub fn new(
        name: impl Into<String>,
        primary: ModelSource,
        fallback: Option<ModelSource>,
        loader: Arc<LoadFn>,
    ) -> Self {
        Self {
            name: name.into(),
            primary,
            fallback,
            loader,
            cell: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The loaded encoder. Blocks while the first load runs.
    pub fn get(&self) -> Result<Arc<dyn LocalEncoder>, ProviderError> {
        self.cell.get_or_init(|| self.load()).clone()
    }

    fn load(&self) -> Result<Arc<dyn LocalEncoder>, ProviderError> {
        info!("Loading local model {} from {}", self.name, self.primary);
        let primary_err = match (self.loader)(&self.primary) {
            Ok(encoder) => return Ok(encoder),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(ProviderError::ResourceInit(format!(
                "{}: {}",
                self.name, primary_err
            )));
        };

        warn!(
            "Local model {} unavailable at {} ({}); trying {}",
            self.name, self.primary, primary_err, fallback
        );
        (self.loader)(fallback).map_err(|fallback_err| {
            ProviderError::ResourceInit(format!(
                "{}: primary {} failed ({}); fallback {} failed ({})",
                self.name, self.primary, primary_err, fallback, fallback_err
            ))
        })
    }
}

/// Static description of a local model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModelSpec {
    /// Published identifier, also the handle key.
    pub model_id: String,
    /// Directory name under the models directory.
    pub local_dir: String,
    /// Identifier tried when the local directory fails.
    pub fallback_id: Option<String>,
    pub query_instruction: Option<String>,
}

impl LocalModelSpec {
    /// `BAAI/bge-large-zh-v1.5`.
    pub fn bge() -> Self {
        Self {
            model_id: "BAAI/bge-large-zh-v1.5".into(),
            local_dir: "bge-large-zh-v1.5".into(),
            fallback_id: Some("BAAI/bge-large-zh-v1.5".into()),
            query_instruction: Some(BGE_QUERY_INSTRUCTION.into()),
        }
    }

    /// Youdao BCE model; the fallback is the InfiniFlow mirror.
    pub fn bce(model_name: &str) -> Self {
        let model_id = if model_name.trim().is_empty() {
            "maidalun1020/bce-embedding-base_v1".to_string()
        } else {
            model_name.to_string()
        };
        Self {
            local_dir: dir_name(&model_id),
            fallback_id: Some(model_id.replace("maidalun1020", "InfiniFlow")),
            query_instruction: None,
            model_id,
        }
    }

    pub fn fastembed(model_name: &str) -> Self {
        let model_id = if model_name.trim().is_empty() {
            "BAAI/bge-small-en-v1.5".to_string()
        } else {
            model_name.to_string()
        };
        Self {
            local_dir: dir_name(&model_id),
            fallback_id: Some(model_id.clone()),
            query_instruction: None,
            model_id,
        }
    }
}

fn dir_name(model_id: &str) -> String {
    model_id.rsplit('/').next().unwrap_or(model_id).to_string()
}

/// Owner of every [`SharedModel`] in the process.
pub struct LocalModels {
    models_dir: PathBuf,
    loader: Arc<LoadFn>,
    models: Mutex<HashMap<String, Arc<SharedModel>>>,
}

impl LocalModels {
    pub fn new<F>(models_dir: impl AsRef<Path>, loader: F) -> Self
    where
        F: Fn(&ModelSource) -> Result<Arc<dyn LocalEncoder>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            loader: Arc::new(loader),
            models: Mutex::new(HashMap::new()),
        }
    }

    /// Pool backed by ONNX Runtime when built with the `onnx` feature;
    /// otherwise every load fails with `ResourceInit`.
    pub fn with_default_loader(models_dir: impl AsRef<Path>) -> Self {
        #[cfg(feature = "onnx")]
        {
            Self::new(models_dir, |source| {
                onnx::OnnxEncoder::load(source).map(|e| Arc::new(e) as Arc<dyn LocalEncoder>)
            })
        }

        #[cfg(not(feature = "onnx"))]
        {
            Self::new(models_dir, |source| {
                Err(ProviderError::ResourceInit(format!(
                    "cannot load {}: built without the `onnx` feature",
                    source
                )))
            })
        }
    }

    /// Handle for `spec`, created on first request. Loading is deferred to
    /// the first `SharedModel::get`.
    pub fn shared(&self, spec: &LocalModelSpec) -> Arc<SharedModel> {
        let mut models = self.models.lock();
        models
            .entry(spec.model_id.clone())
            .or_insert_with(|| {
                Arc::new(SharedModel::new(
                    spec.model_id.clone(),
                    ModelSource::Directory(self.models_dir.join(&spec.local_dir)),
                    spec.fallback_id.clone().map(ModelSource::Hub),
                    self.loader.clone(),
                ))
            })
            .clone()
    }
}
