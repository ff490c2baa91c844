//! Chat completion route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use ragsage_chat::{ChatResult, ConversationTurn, GenerationConfig};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub llm_id: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
    /// Unknown keys are dropped while deserializing.
    #[serde(default)]
    pub gen_conf: GenerationConfig,
}

/// POST /api/chat
///
/// Vendor failures still answer 200: the error is carried in `answer`.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResult>, ApiError> {
    let model = state
        .chat_model(&req.llm_id)
        .ok_or_else(|| ApiError::UnknownProvider(req.llm_id.clone()))?;
    let result = model.chat(&req.system, &req.messages, &req.gen_conf).await;
    Ok(Json(result))
}
