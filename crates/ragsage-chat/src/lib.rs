//! RagSage Chat — uniform chat interface over remote and local LLM vendors.
//!
//! Every vendor adapter implements [`ChatModel`]. Calls never fail past the
//! trait boundary: transport, credential and vendor errors come back as an
//! answer starting with `**ERROR**:` and zero token usage.

pub mod config;
pub mod model;
pub mod notice;
pub mod options;
pub mod providers;
pub mod types;

pub use config::{create_chat_model, ChatBackend};
pub use model::ChatModel;
pub use options::{GenOption, GenerationConfig};
pub use types::*;
