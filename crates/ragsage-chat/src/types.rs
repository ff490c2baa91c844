//! Provider-neutral chat types.

use serde::{Deserialize, Serialize};

use ragsage_core::ProviderError;

use crate::notice::continuation_notice;

/// Prefix of every answer produced from a failed call.
pub const ERROR_MARKER: &str = "**ERROR**:";

/// Conversation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Why the vendor stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Output hit the length limit; the answer is partial.
    Length,
    Other(String),
    /// The vendor did not say.
    Unknown,
}

impl FinishReason {
    pub fn from_vendor(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(other) if !other.is_empty() => FinishReason::Other(other.to_string()),
            _ => FinishReason::Unknown,
        }
    }
}

/// A vendor response normalized by an adapter, before truncation handling.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub answer: String,
    pub finish_reason: FinishReason,
    /// Prompt + completion tokens, 0 when the vendor does not report usage.
    pub total_tokens: u64,
}

/// Outcome of one chat call. Failures are carried in `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResult {
    pub answer: String,
    pub token_usage: u64,
}

impl ChatResult {
    /// Error-marked result for a failed call.
    pub fn error(err: &ProviderError) -> Self {
        Self {
            answer: format!("{} {}", ERROR_MARKER, err),
            token_usage: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.answer.starts_with(ERROR_MARKER)
    }
}

impl TryFrom<Completion> for ChatResult {
    type Error = ProviderError;

    /// Trim the answer and append the continuation notice when the
    /// vendor cut generation short.
    fn try_from(completion: Completion) -> Result<Self, Self::Error> {
        let mut answer = completion.answer.trim().to_string();
        if answer.is_empty() {
            return Err(ProviderError::Malformed("empty answer".into()));
        }
        if completion.finish_reason == FinishReason::Length {
            let notice = continuation_notice(&answer);
            answer.push_str(notice);
        }
        Ok(Self {
            answer,
            token_usage: completion.total_tokens,
        })
    }
}
