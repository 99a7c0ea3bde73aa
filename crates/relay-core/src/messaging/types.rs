use serde::Deserialize;

use crate::domain::{BotIdentity, ChatId, MessageId, MessageRef, UserId};

/// Inbound webhook envelope.
///
/// Only the fields the relay consumes are modelled; everything else in the
/// platform payload is ignored by serde. Updates without a `message`
/// (edits, channel posts, callbacks) deserialize with `message: None`.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundUpdate {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<InboundMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub caption_entities: Vec<Entity>,
    #[serde(default)]
    pub reply_to_message: Option<ReplyRef>,

    #[serde(default)]
    pub photo: Vec<FileRef>,
    #[serde(default)]
    pub video: Option<FileRef>,
    #[serde(default)]
    pub document: Option<FileRef>,
    #[serde(default)]
    pub audio: Option<FileRef>,
    #[serde(default)]
    pub voice: Option<FileRef>,
    #[serde(default)]
    pub sticker: Option<FileRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Sender {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// The message an inbound message replies to. Only its id matters here.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ReplyRef {
    pub message_id: MessageId,
}

/// Text entity. Offsets and lengths are in UTF-16 code units.
#[derive(Clone, Debug, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
    #[serde(default)]
    pub user: Option<EntityUser>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct EntityUser {
    pub id: UserId,
}

/// Any platform file object; the relay only needs the reusable handle.
#[derive(Clone, Debug, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

/// Media payload that can be re-sent by handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Media {
    Photo(String),
    Video(String),
    Document(String),
    Audio(String),
    Voice(String),
    Sticker(String),
}

impl Media {
    pub fn file_id(&self) -> &str {
        match self {
            Media::Photo(id)
            | Media::Video(id)
            | Media::Document(id)
            | Media::Audio(id)
            | Media::Voice(id)
            | Media::Sticker(id) => id,
        }
    }
}

/// What an operator reply carries back to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyContent {
    Media {
        media: Media,
        caption: Option<String>,
    },
    Text(String),
}

impl InboundMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }

    pub fn is_private(&self) -> bool {
        self.chat.kind == ChatKind::Private
    }

    pub fn reply_target(&self) -> Option<MessageId> {
        self.reply_to_message.map(|r| r.message_id)
    }

    /// First media payload in platform order: photo, video, document, audio,
    /// voice, sticker. For photos the largest size (last entry) is used.
    pub fn media(&self) -> Option<Media> {
        let id = |f: &FileRef| f.file_id.clone();
        self.photo
            .last()
            .map(|f| Media::Photo(id(f)))
            .or_else(|| self.video.as_ref().map(|f| Media::Video(id(f))))
            .or_else(|| self.document.as_ref().map(|f| Media::Document(id(f))))
            .or_else(|| self.audio.as_ref().map(|f| Media::Audio(id(f))))
            .or_else(|| self.voice.as_ref().map(|f| Media::Voice(id(f))))
            .or_else(|| self.sticker.as_ref().map(|f| Media::Sticker(id(f))))
    }

    /// Media (with caption) if present, else non-empty text.
    pub fn reply_content(&self) -> Option<ReplyContent> {
        if let Some(media) = self.media() {
            let caption = self.caption.clone().filter(|c| !c.is_empty());
            return Some(ReplyContent::Media { media, caption });
        }
        self.text
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| ReplyContent::Text(t.clone()))
    }

    /// True if the message carries anything the relay knows how to handle.
    pub fn has_content(&self) -> bool {
        self.reply_content().is_some()
    }

    /// Does the text or caption tag the bot?
    pub fn mentions(&self, bot: &BotIdentity) -> bool {
        entities_mention(self.text.as_deref(), &self.entities, bot)
            || entities_mention(self.caption.as_deref(), &self.caption_entities, bot)
    }
}

fn entities_mention(text: Option<&str>, entities: &[Entity], bot: &BotIdentity) -> bool {
    entities.iter().any(|e| match e.kind.as_str() {
        "mention" => {
            let (Some(text), Some(username)) = (text, bot.username.as_deref()) else {
                return false;
            };
            utf16_slice(text, e.offset, e.length)
                .map(|tag| tag.trim_start_matches('@').eq_ignore_ascii_case(username))
                .unwrap_or(false)
        }
        "text_mention" => e.user.is_some_and(|u| u.id == bot.id),
        _ => false,
    })
}

fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    let slice = units.get(offset..end)?;
    String::from_utf16(slice).ok()
}
