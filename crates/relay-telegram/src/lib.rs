//! Telegram adapter (teloxide).
//!
//! This crate implements the `relay-core` RelayPort over the Telegram Bot API
//! and hosts the webhook HTTP server.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    requests::HasPayload,
    types::{InputFile, ParseMode},
};

use tokio::time::sleep;
use tracing::warn;

pub mod router;
pub mod webhook;

use relay_core::{
    domain::{BotIdentity, ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{port::RelayPort, types::Media},
    Result,
};

#[derive(Clone)]
pub struct TelegramRelay {
    bot: Bot,
}

impl TelegramRelay {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Ask the platform who we are (`getMe`).
    pub async fn identity(&self) -> Result<BotIdentity> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        Ok(BotIdentity {
            id: UserId(me.user.id.0 as i64),
            username: me.user.username.clone(),
        })
    }

    /// Point the platform's update delivery at `url` (`setWebhook`).
    pub async fn register_webhook(&self, url: &str) -> Result<()> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid webhook url '{url}': {e}")))?;
        self.with_retry(|| self.bot.set_webhook(url.clone())).await?;
        Ok(())
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    fn sent(msg: &Message) -> MessageRef {
        MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        warn!(retry_after = ?d, "telegram flood limit hit; retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Send a captioned media request threaded under `reply_to`. Only the
/// request constructor differs between media kinds.
macro_rules! send_captioned {
    ($relay:expr, $request:expr, $caption:expr, $reply_to:expr) => {
        $relay
            .with_retry(|| {
                let mut req = $request;
                let p = req.payload_mut();
                p.caption = $caption.clone();
                p.reply_to_message_id = $reply_to;
                p.allow_sending_without_reply = Some(true);
                req
            })
            .await?
    };
}

#[async_trait]
impl RelayPort for TelegramRelay {
    async fn forward_message(&self, target: ChatId, source: MessageRef) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::tg_chat(target),
                    Self::tg_chat(source.chat_id),
                    Self::tg_msg_id(source.message_id),
                )
            })
            .await?;
        Ok(Self::sent(&msg))
    }

    async fn send_text(
        &self,
        target: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_message(Self::tg_chat(target), text.to_string());
                let p = req.payload_mut();
                p.reply_to_message_id = reply_to.map(Self::tg_msg_id);
                p.allow_sending_without_reply = Some(true);
                req
            })
            .await?;
        Ok(Self::sent(&msg))
    }

    async fn send_html(
        &self,
        target: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(target), html.to_string())
                    .parse_mode(ParseMode::Html);
                let p = req.payload_mut();
                p.reply_to_message_id = reply_to.map(Self::tg_msg_id);
                p.allow_sending_without_reply = Some(true);
                req
            })
            .await?;
        Ok(Self::sent(&msg))
    }

    async fn send_media(
        &self,
        target: ChatId,
        media: &Media,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let chat = Self::tg_chat(target);
        let reply_to = reply_to.map(Self::tg_msg_id);
        let caption = caption.map(str::to_string);
        let file = || InputFile::file_id(media.file_id().to_string());

        let msg = match media {
            Media::Photo(_) => {
                send_captioned!(self, self.bot.send_photo(chat, file()), caption, reply_to)
            }
            Media::Video(_) => {
                send_captioned!(self, self.bot.send_video(chat, file()), caption, reply_to)
            }
            Media::Document(_) => {
                send_captioned!(self, self.bot.send_document(chat, file()), caption, reply_to)
            }
            Media::Audio(_) => {
                send_captioned!(self, self.bot.send_audio(chat, file()), caption, reply_to)
            }
            Media::Voice(_) => {
                send_captioned!(self, self.bot.send_voice(chat, file()), caption, reply_to)
            }
            // Stickers carry no caption.
            Media::Sticker(_) => {
                if caption.is_some() {
                    warn!(chat_id = target.0, "dropping caption on sticker reply");
                }
                self.with_retry(|| {
                    let mut req = self.bot.send_sticker(chat, file());
                    let p = req.payload_mut();
                    p.reply_to_message_id = reply_to.map(|m| m.0);
                    p.allow_sending_without_reply = Some(true);
                    req
                })
                .await?
            }
        };
        Ok(Self::sent(&msg))
    }
}
