//! RagSage Infer — embedding providers.
//!
//! Every vendor implements [`EmbeddingModel`]: texts go in, one vector per
//! text comes out in input order, plus a token-usage figure. Remote vendors
//! speak HTTP; BAAI, Youdao and FastEmbed run in-process through a
//! [`LocalModels`] pool (ONNX Runtime with the `onnx` feature).

pub mod batch;
pub mod config;
pub mod local;
pub mod model;
pub mod providers;
pub mod types;

pub use config::{create_embedding_model, EmbeddingBackend, DEFAULT_BATCH_SIZE};
pub use local::{LocalEncoder, LocalModelSpec, LocalModels, ModelSource, SharedModel};
pub use model::EmbeddingModel;
pub use types::{EmbeddingBatch, QueryEmbedding};
