//! Durable link mapping + reply set.
//!
//! One `LinkStore` trait with swappable backends, chosen at startup from
//! [`StoreConfig`]. The directory only ever talks to the trait.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::StoreConfig,
    domain::{ChatId, MessageId, MessageLink, UserId},
    Result,
};

mod file;
mod memory;
mod remote;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::RemoteDocumentStore;

/// Persisted state: forwarded id -> origin tuple, plus the replied set.
///
/// JSON layout:
/// `{"links": {"<forwarded_id>": [origin_chat, origin_message_id, operator_id]}, "replied": [id, ...]}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub links: BTreeMap<MessageId, LinkEntry>,
    #[serde(default)]
    pub replied: BTreeSet<MessageId>,
}

/// Tuple form of a link. Two-element entries come from single-operator stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkEntry {
    Routed(ChatId, MessageId, UserId),
    Legacy(ChatId, MessageId),
}

impl LinkEntry {
    pub fn into_link(self, forwarded_id: MessageId) -> MessageLink {
        let (origin_chat, origin_message_id, operator_id) = match self {
            LinkEntry::Routed(chat, msg, op) => (chat, msg, Some(op)),
            LinkEntry::Legacy(chat, msg) => (chat, msg, None),
        };
        MessageLink {
            forwarded_id,
            origin_chat,
            origin_message_id,
            operator_id,
        }
    }
}

impl From<&MessageLink> for LinkEntry {
    fn from(link: &MessageLink) -> Self {
        match link.operator_id {
            Some(op) => LinkEntry::Routed(link.origin_chat, link.origin_message_id, op),
            None => LinkEntry::Legacy(link.origin_chat, link.origin_message_id),
        }
    }
}

impl StoreSnapshot {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Backend for the relay's durable state.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Read the whole snapshot. A backend with nothing stored yet returns
    /// an empty snapshot; unreadable or corrupt state is an error.
    async fn load(&self) -> Result<StoreSnapshot>;

    /// Replace the stored snapshot. Either the whole snapshot lands or the
    /// call fails.
    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;

    /// `load`, degraded to an empty snapshot on failure. Startup never
    /// crashes on bad state.
    async fn load_or_empty(&self) -> StoreSnapshot {
        match self.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(store = self.name(), error = %e, "failed to load relay state; starting empty");
                StoreSnapshot::default()
            }
        }
    }
}

/// Build the backend selected by configuration.
pub fn open(cfg: &StoreConfig) -> Result<Arc<dyn LinkStore>> {
    let store: Arc<dyn LinkStore> = match cfg {
        StoreConfig::Memory => Arc::new(MemoryStore::default()),
        StoreConfig::File { path } => Arc::new(FileStore::new(path.clone())),
        StoreConfig::Remote { url, token } => {
            Arc::new(RemoteDocumentStore::new(url.clone(), token.clone())?)
        }
    };
    Ok(store)
}
