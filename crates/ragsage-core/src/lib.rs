//! RagSage Core — provider errors, configuration, HTTP plumbing.

pub mod config;
pub mod error;
pub mod http;

pub use config::{DataPaths, ProviderConfig, RagSageConfig};
pub use error::{Error, ProviderError, Result};
