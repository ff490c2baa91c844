//! Vendor adapters implementing [`ChatModel`](crate::model::ChatModel).

pub mod ollama;
pub mod openai;
pub mod qwen;

pub use ollama::OllamaChat;
pub use openai::OpenAiChat;
pub use qwen::QwenChat;
