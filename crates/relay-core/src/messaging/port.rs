use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::Media,
    Result,
};

/// Outbound RPC port to the messaging platform.
///
/// Every call either creates exactly one message and returns its reference,
/// or fails with `Error::Transport`. Implementations must not retry a relay
/// on their own beyond honouring an explicit platform flood-wait.
#[async_trait]
pub trait RelayPort: Send + Sync {
    /// Copy `source` into `target`, keeping the "forwarded from" header.
    async fn forward_message(&self, target: ChatId, source: MessageRef) -> Result<MessageRef>;

    /// Plain text, delivered verbatim (no markup parsing).
    async fn send_text(
        &self,
        target: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    /// HTML-formatted notice for operators.
    async fn send_html(
        &self,
        target: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    /// Re-send a media payload by its platform handle.
    async fn send_media(
        &self,
        target: ChatId,
        media: &Media,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;
}
