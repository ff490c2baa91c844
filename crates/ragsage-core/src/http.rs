//! Shared HTTP plumbing for vendor adapters.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Build the client a provider instance owns, honouring its timeout.
pub fn build_client(config: &ProviderConfig) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into the matching `ProviderError`.
pub async fn check_response(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    debug!("Provider returned {}: {}", status, message);

    match status.as_u16() {
        401 | 403 => Err(ProviderError::Authentication {
            status: status.as_u16(),
            message,
        }),
        code => Err(ProviderError::VendorApi {
            status: code,
            message,
        }),
    }
}

/// Check the status and decode the JSON body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let response = check_response(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(format!("{}: {}", e, truncate(&body, 200))))
}

/// Pull a human-readable message out of a vendor error body.
///
/// Handles `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}` shapes; falls back to the raw body.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            &value["error"]["message"],
            &value["error"],
            &value["message"],
        ];
        for candidate in candidates {
            if let Some(msg) = candidate.as_str() {
                return msg.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        "empty response body".to_string()
    } else {
        body.trim().to_string()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
