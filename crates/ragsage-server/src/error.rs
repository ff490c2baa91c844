//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use ragsage_core::ProviderError;

#[derive(Debug)]
pub enum ApiError {
    /// No provider with this id is configured.
    UnknownProvider(String),
    Provider(ProviderError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            ApiError::Provider(e) => match e {
                ProviderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ProviderError::ResourceInit(_) | ProviderError::Config(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ProviderError::InferenceTask(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ProviderError::Transport(_)
                | ProviderError::Authentication { .. }
                | ProviderError::VendorApi { .. }
                | ProviderError::Malformed(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        ApiError::Provider(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::UnknownProvider(id) => write!(f, "unknown provider: {}", id),
            ApiError::Provider(e) => write!(f, "{}", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
