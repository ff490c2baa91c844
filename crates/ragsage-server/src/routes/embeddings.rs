//! Embedding routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragsage_infer::DEFAULT_BATCH_SIZE;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/embeddings", post(encode))
        .route("/embeddings/query", post(encode_query))
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    pub embd_id: String,
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub vectors: Vec<Vec<f32>>,
    pub token_usage: u64,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub embd_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub vector: Vec<f32>,
    pub token_usage: u64,
}

/// POST /api/embeddings
async fn encode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EncodeRequest>,
) -> Result<Json<EncodeResponse>, ApiError> {
    let model = state
        .embedding_model(&req.embd_id)
        .ok_or_else(|| ApiError::UnknownProvider(req.embd_id.clone()))?;

    debug!(
        "Encoding {} texts with {} (batch {})",
        req.texts.len(),
        req.embd_id,
        req.batch_size
    );
    let batch = model.encode(&req.texts, req.batch_size).await?;

    Ok(Json(EncodeResponse {
        vectors: batch.vectors.into_iter().map(|v| v.to_vec()).collect(),
        token_usage: batch.token_usage,
    }))
}

/// POST /api/embeddings/query
async fn encode_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let model = state
        .embedding_model(&req.embd_id)
        .ok_or_else(|| ApiError::UnknownProvider(req.embd_id.clone()))?;
    let query = model.encode_query(&req.text).await?;

    Ok(Json(QueryResponse {
        vector: query.vector.to_vec(),
        token_usage: query.token_usage,
    }))
}
