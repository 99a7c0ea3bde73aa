//! In-crate test doubles.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::RelayPort, types::Media},
    store::{LinkStore, MemoryStore, StoreSnapshot},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Forward {
        target: ChatId,
        source: MessageRef,
    },
    Text {
        target: ChatId,
        text: String,
        reply_to: Option<MessageId>,
    },
    Html {
        target: ChatId,
        html: String,
        reply_to: Option<MessageId>,
    },
    Media {
        target: ChatId,
        media: Media,
        caption: Option<String>,
        reply_to: Option<MessageId>,
    },
}

impl Call {
    pub fn target(&self) -> ChatId {
        match self {
            Call::Forward { target, .. }
            | Call::Text { target, .. }
            | Call::Html { target, .. }
            | Call::Media { target, .. } => *target,
        }
    }
}

/// Records successful calls; calls to chats marked with `fail_for` error out.
/// Created messages get ids 1000, 1001, ...
#[derive(Default)]
pub struct RecordingPort {
    next_id: Mutex<i32>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<ChatId>>,
}

impl RecordingPort {
    pub fn fail_for(&self, chat: ChatId) {
        self.failing.lock().unwrap().insert(chat);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn forwards(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Forward { .. }))
            .collect()
    }

    pub fn html_to(&self, chat: ChatId) -> Vec<(String, Option<MessageId>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Html {
                    target,
                    html,
                    reply_to,
                } if target == chat => Some((html, reply_to)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<MessageRef> {
        let target = call.target();
        if self.failing.lock().unwrap().contains(&target) {
            return Err(Error::Transport(format!("chat {} unreachable", target.0)));
        }
        self.calls.lock().unwrap().push(call);
        let mut next = self.next_id.lock().unwrap();
        let id = 1000 + *next;
        *next += 1;
        Ok(MessageRef {
            chat_id: target,
            message_id: MessageId(id),
        })
    }
}

#[async_trait]
impl RelayPort for RecordingPort {
    async fn forward_message(&self, target: ChatId, source: MessageRef) -> Result<MessageRef> {
        self.record(Call::Forward { target, source })
    }

    async fn send_text(
        &self,
        target: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.record(Call::Text {
            target,
            text: text.to_string(),
            reply_to,
        })
    }

    async fn send_html(
        &self,
        target: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.record(Call::Html {
            target,
            html: html.to_string(),
            reply_to,
        })
    }

    async fn send_media(
        &self,
        target: ChatId,
        media: &Media,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.record(Call::Media {
            target,
            media: media.clone(),
            caption: caption.map(str::to_string),
            reply_to,
        })
    }
}

/// Memory-backed store that counts successful saves and can be told to fail
/// every save from then on.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    saves: AtomicUsize,
    broken: AtomicBool,
}

impl CountingStore {
    pub fn break_saves(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// What the last successful save wrote.
    pub async fn saved(&self) -> StoreSnapshot {
        self.inner.load().await.unwrap()
    }
}

#[async_trait]
impl LinkStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        self.inner.load().await
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(Error::Persistence("disk full".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(snapshot).await
    }
}
