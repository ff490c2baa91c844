//! The chat capability shared by every vendor adapter.

use async_trait::async_trait;
use tracing::{debug, warn};

use ragsage_core::ProviderError;

use crate::config::ChatBackend;
use crate::options::{supported_options, GenerationConfig};
use crate::types::{ChatResult, Completion, ConversationTurn, Role};

/// Uniform chat interface over vendor backends.
///
/// Adapters implement [`ChatModel::complete`]; callers use
/// [`ChatModel::chat`], which never fails: errors come back as an
/// `**ERROR**:` answer with zero token usage.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn backend(&self) -> ChatBackend;

    fn model_name(&self) -> &str;

    /// Issue one upstream call. `messages` already carries the system
    /// prompt; `options` is already filtered to the backend's allow-list.
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        options: &GenerationConfig,
    ) -> Result<Completion, ProviderError>;

    async fn chat(
        &self,
        system: &str,
        history: &[ConversationTurn],
        gen_conf: &GenerationConfig,
    ) -> ChatResult {
        let messages = match prepare_messages(system, history) {
            Ok(messages) => messages,
            Err(e) => return ChatResult::error(&e),
        };
        let options = gen_conf.filtered(supported_options(self.backend()));

        debug!(
            "Chat via {} model={} turns={}",
            self.backend(),
            self.model_name(),
            messages.len()
        );

        let outcome = self
            .complete(&messages, &options)
            .await
            .and_then(ChatResult::try_from);

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("{} chat failed: {}", self.backend(), e);
                ChatResult::error(&e)
            }
        }
    }
}

/// Build the outgoing message list for one call.
///
/// A leading system turn in `history` is never forwarded as history; it is
/// used as the system prompt when `system` is empty. The caller's slice is
/// not modified.
pub fn prepare_messages(
    system: &str,
    history: &[ConversationTurn],
) -> Result<Vec<ConversationTurn>, ProviderError> {
    let (leading_system, rest) = match history.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first.content.as_str()), rest),
        _ => (None, history),
    };

    if !rest
        .iter()
        .any(|t| matches!(t.role, Role::User | Role::Assistant))
    {
        return Err(ProviderError::InvalidRequest(
            "conversation history has no user or assistant turns".into(),
        ));
    }

    let system = if system.trim().is_empty() {
        leading_system.unwrap_or("")
    } else {
        system
    };

    let mut messages = Vec::with_capacity(rest.len() + 1);
    if !system.trim().is_empty() {
        messages.push(ConversationTurn::system(system));
    }
    messages.extend_from_slice(rest);
    Ok(messages)
}
