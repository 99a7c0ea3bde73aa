//! Dispatch engine: classify each inbound event and route it.
//!
//! Events from configured operators that reply to a forwarded copy are
//! relayed back to the original chat. Everything else from non-operators is
//! forwarded to every operator when it is addressed to the bot (private chat
//! or mention). No state is kept between events beyond the [`RelayDirectory`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    directory::RelayDirectory,
    domain::{BotIdentity, MessageId, MessageLink, MessageRef, UserId},
    errors::Error,
    fanout::Fanout,
    messaging::{
        port::RelayPort,
        types::{InboundMessage, InboundUpdate, ReplyContent, Sender},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Update carried no new message (edit, callback, channel post...).
    NoMessage,
    NoSender,
    /// Group message from a user that neither is private nor mentions the bot.
    NotAddressed,
    /// Operator message that does not reply to anything.
    NotAReply,
    /// Operator message sent anywhere but the operator's own chat with the bot.
    OutsideOperatorChat,
    /// No text and no supported media.
    EmptyContent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ignored(SkipReason),
    Forwarded { links: Vec<MessageLink> },
    Relayed { origin: MessageRef },
    RelayFailed { origin: MessageRef },
    Unresolved { replied_to: MessageId },
}

pub struct Dispatcher {
    port: Arc<dyn RelayPort>,
    directory: Arc<RelayDirectory>,
    fanout: Fanout,
    bot: BotIdentity,
}

impl Dispatcher {
    pub fn new(
        port: Arc<dyn RelayPort>,
        directory: Arc<RelayDirectory>,
        operators: Vec<UserId>,
        bot: BotIdentity,
    ) -> Self {
        let fanout = Fanout::new(port.clone(), directory.clone(), operators);
        Self {
            port,
            directory,
            fanout,
            bot,
        }
    }

    /// Handle one webhook event. Never fails: every problem is logged and
    /// reflected in the returned [`Outcome`].
    pub async fn handle_update(&self, update: InboundUpdate) -> Outcome {
        let Some(msg) = update.message else {
            debug!(update_id = update.update_id, "update without message");
            return Outcome::Ignored(SkipReason::NoMessage);
        };
        self.handle_message(&msg).await
    }

    pub async fn handle_message(&self, msg: &InboundMessage) -> Outcome {
        let Some(sender) = msg.from.as_ref() else {
            return Outcome::Ignored(SkipReason::NoSender);
        };

        if self.fanout.is_operator(sender.id) {
            self.operator_path(msg, sender).await
        } else {
            self.user_path(msg, sender).await
        }
    }

    async fn user_path(&self, msg: &InboundMessage, sender: &Sender) -> Outcome {
        if !msg.is_private() && !msg.mentions(&self.bot) {
            return Outcome::Ignored(SkipReason::NotAddressed);
        }
        if !msg.has_content() {
            debug!(chat_id = msg.chat.id.0, "user message without text or media");
            return Outcome::Ignored(SkipReason::EmptyContent);
        }

        let links = self.fanout.forward(msg, sender).await;
        Outcome::Forwarded { links }
    }

    async fn operator_path(&self, msg: &InboundMessage, sender: &Sender) -> Outcome {
        // Forwarded copies live only in the operator's private chat.
        if !msg.is_private() || msg.chat.id != sender.id.private_chat() {
            debug!(
                operator = sender.id.0,
                chat_id = msg.chat.id.0,
                "operator message outside their chat with the bot"
            );
            return Outcome::Ignored(SkipReason::OutsideOperatorChat);
        }
        let Some(replied_to) = msg.reply_target() else {
            return Outcome::Ignored(SkipReason::NotAReply);
        };

        let link = match self.directory.resolve(replied_to).await {
            Ok(link) => link,
            Err(e) => {
                info!(
                    operator = sender.id.0,
                    replied_to = replied_to.0,
                    error = %e,
                    "operator reply does not match a forwarded message"
                );
                return Outcome::Unresolved { replied_to };
            }
        };
        // Ids are per chat; another operator's link is a different message.
        if link.operator_id.is_some_and(|op| op != sender.id) {
            warn!(
                operator = sender.id.0,
                replied_to = replied_to.0,
                "forwarded id belongs to another operator's chat"
            );
            return Outcome::Unresolved { replied_to };
        }

        let Some(content) = msg.reply_content() else {
            debug!(operator = sender.id.0, "operator reply without text or media");
            return Outcome::Ignored(SkipReason::EmptyContent);
        };

        let origin = link.origin();
        let reply = msg.message_ref();
        match self.relay(&content, origin).await {
            Ok(sent) => {
                info!(
                    operator = sender.id.0,
                    chat_id = origin.chat_id.0,
                    message_id = sent.message_id.0,
                    "reply relayed"
                );
                if let Err(e) = self.directory.mark_replied(origin.message_id).await {
                    error!(message_id = origin.message_id.0, error = %e, "reply mark not persisted");
                }
                self.fanout.acknowledge(sender, reply, &link).await;
                Outcome::Relayed { origin }
            }
            Err(e) => {
                warn!(
                    operator = sender.id.0,
                    chat_id = origin.chat_id.0,
                    error = %e,
                    "reply relay failed"
                );
                self.fanout.report_failure(reply, &e).await;
                Outcome::RelayFailed { origin }
            }
        }
    }

    async fn relay(&self, content: &ReplyContent, origin: MessageRef) -> Result<MessageRef, Error> {
        let reply_to = Some(origin.message_id);
        match content {
            ReplyContent::Media { media, caption } => {
                self.port
                    .send_media(origin.chat_id, media, caption.as_deref(), reply_to)
                    .await
            }
            ReplyContent::Text(text) => self.port.send_text(origin.chat_id, text, reply_to).await,
        }
    }
}
