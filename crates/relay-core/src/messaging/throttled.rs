use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::{port::RelayPort, types::Media},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls targeting the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

/// Next free send slot for one lane (global or a single chat).
#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Take the next slot; returns how long to wait for it.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = self.next.max(now);
        self.next = start + self.interval;
        start - now
    }

    fn idle(&self, now: Instant) -> bool {
        self.next <= now
    }
}

/// Per-chat lanes are dropped once idle, after the map grows past this.
const PRUNE_THRESHOLD: usize = 256;

/// RelayPort decorator that spaces outbound calls.
///
/// Fan-out to several operators plus their notices can burst well past the
/// platform's per-chat limits; this keeps the burst under them instead of
/// collecting 429s.
pub struct ThrottledRelayPort {
    inner: Arc<dyn RelayPort>,
    per_chat_interval: Duration,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, IntervalLimiter>>,
}

impl ThrottledRelayPort {
    pub fn new(inner: Arc<dyn RelayPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            per_chat_interval: cfg.per_chat_min_interval,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn reserve_chat(&self, chat_id: ChatId) -> Duration {
        let mut lanes = self.per_chat.lock().await;
        if lanes.len() >= PRUNE_THRESHOLD {
            let now = Instant::now();
            lanes.retain(|_, lane| !lane.idle(now));
        }
        lanes
            .entry(chat_id)
            .or_insert_with(|| IntervalLimiter::new(self.per_chat_interval))
            .reserve()
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let global_wait = self.global.lock().await.reserve();
        let chat_wait = self.reserve_chat(chat_id).await;

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn lanes(&self) -> usize {
        self.per_chat.lock().await.len()
    }
}

#[async_trait::async_trait]
impl RelayPort for ThrottledRelayPort {
    async fn forward_message(&self, target: ChatId, source: MessageRef) -> Result<MessageRef> {
        self.throttle_chat(target).await;
        self.inner.forward_message(target, source).await
    }

    async fn send_text(
        &self,
        target: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.throttle_chat(target).await;
        self.inner.send_text(target, text, reply_to).await
    }

    async fn send_html(
        &self,
        target: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.throttle_chat(target).await;
        self.inner.send_html(target, html, reply_to).await
    }

    async fn send_media(
        &self,
        target: ChatId,
        media: &Media,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        self.throttle_chat(target).await;
        self.inner.send_media(target, media, caption, reply_to).await
    }
}
