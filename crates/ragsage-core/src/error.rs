//! Error types for RagSage.

use thiserror::Error;

/// Failures raised while talking to a chat or embedding provider.
///
/// Chat models fold these into an error-marked answer; embedding models
/// return them to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection, DNS, TLS or timeout failure reaching the vendor.
    #[error("transport error: {0}")]
    Transport(String),

    /// The vendor rejected the credential.
    #[error("authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    /// Well-formed error response (rate limit, unknown model, content policy).
    #[error("api error (status {status}): {message}")]
    VendorApi { status: u16, message: String },

    /// The vendor answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A local model could not be loaded from its primary or fallback source.
    #[error("model initialization failed: {0}")]
    ResourceInit(String),

    /// Local model inference failed, or its blocking task panicked.
    #[error("local inference failed: {0}")]
    InferenceTask(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let message = error_chain(&e);
        if e.is_decode() {
            ProviderError::Malformed(message)
        } else if e.is_timeout() {
            ProviderError::Transport(format!("timed out: {}", message))
        } else {
            ProviderError::Transport(message)
        }
    }
}

/// `err` followed by each of its sources, joined with `: `.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Malformed(e.to_string())
    }
}

/// Errors raised outside the provider boundary (configuration files, IO).
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
