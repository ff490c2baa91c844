//! Embedding vendor adapters.

mod local;
mod ollama;
mod openai;
mod qwen;

pub use local::LocalEmbedding;
pub use ollama::{OllamaEmbedding, OLLAMA_TOKENS_PER_CALL};
pub use openai::OpenAiEmbedding;
pub use qwen::QwenEmbedding;
