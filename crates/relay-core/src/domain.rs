use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric, unique within a chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl UserId {
    /// The private chat between the bot and this user.
    pub fn private_chat(self) -> ChatId {
        ChatId(self.0)
    }
}

/// Who the bot is, as reported by `getMe` (or overridden by config).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub username: Option<String>,
}

/// One forwarded copy of a user message, as delivered to one operator.
///
/// `operator_id` is `None` only for entries loaded from single-operator
/// stores written before operators were tracked per link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLink {
    pub forwarded_id: MessageId,
    pub origin_chat: ChatId,
    pub origin_message_id: MessageId,
    pub operator_id: Option<UserId>,
}

impl MessageLink {
    pub fn origin(&self) -> MessageRef {
        MessageRef {
            chat_id: self.origin_chat,
            message_id: self.origin_message_id,
        }
    }
}
