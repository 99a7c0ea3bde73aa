use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{ChatId, MessageId, MessageLink, UserId},
    errors::Error,
    store::{LinkEntry, LinkStore, StoreSnapshot},
    Result,
};

/// In-memory index of forwarded copies, written through to a [`LinkStore`].
///
/// Every mutation takes the single state lock, changes memory, then saves
/// the snapshot before releasing it, so concurrent webhook tasks cannot lose
/// each other's updates. If the save fails the in-memory change is kept and
/// the caller gets `Error::Persistence`.
pub struct RelayDirectory {
    store: Arc<dyn LinkStore>,
    state: Mutex<StoreSnapshot>,
}

impl RelayDirectory {
    /// Load the store (empty on failure) and build the directory.
    pub async fn open(store: Arc<dyn LinkStore>) -> Self {
        let snapshot = store.load_or_empty().await;
        info!(
            store = store.name(),
            links = snapshot.links.len(),
            replied = snapshot.replied.len(),
            "relay directory loaded"
        );
        Self {
            store,
            state: Mutex::new(snapshot),
        }
    }

    pub async fn record_link(
        &self,
        forwarded_id: MessageId,
        origin_chat: ChatId,
        origin_message_id: MessageId,
        operator_id: UserId,
    ) -> Result<()> {
        let mut st = self.state.lock().await;
        if st.links.contains_key(&forwarded_id) {
            warn!(
                forwarded_id = forwarded_id.0,
                "forwarded id already linked; keeping existing link"
            );
            return Err(Error::DuplicateKey(forwarded_id));
        }

        st.links.insert(
            forwarded_id,
            LinkEntry::Routed(origin_chat, origin_message_id, operator_id),
        );
        debug!(
            forwarded_id = forwarded_id.0,
            origin_chat = origin_chat.0,
            origin_message_id = origin_message_id.0,
            operator = operator_id.0,
            "link recorded"
        );
        self.persist(&st).await
    }

    pub async fn resolve(&self, forwarded_id: MessageId) -> Result<MessageLink> {
        let st = self.state.lock().await;
        st.links
            .get(&forwarded_id)
            .map(|entry| entry.into_link(forwarded_id))
            .ok_or(Error::NotFound(forwarded_id))
    }

    /// Every operator's copy of the same original message.
    pub async fn links_for_origin(
        &self,
        origin_chat: ChatId,
        origin_message_id: MessageId,
    ) -> Vec<MessageLink> {
        let st = self.state.lock().await;
        st.links
            .iter()
            .map(|(id, entry)| entry.into_link(*id))
            .filter(|l| l.origin_chat == origin_chat && l.origin_message_id == origin_message_id)
            .collect()
    }

    /// Idempotent: marking an already-marked id does not touch the store.
    pub async fn mark_replied(&self, origin_message_id: MessageId) -> Result<()> {
        let mut st = self.state.lock().await;
        if !st.replied.insert(origin_message_id) {
            return Ok(());
        }
        self.persist(&st).await
    }

    pub async fn was_replied(&self, origin_message_id: MessageId) -> bool {
        self.state.lock().await.replied.contains(&origin_message_id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.links.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().await.clone()
    }

    async fn persist(&self, snapshot: &StoreSnapshot) -> Result<()> {
        self.store.save(snapshot).await.map_err(|e| {
            error!(store = self.store.name(), error = %e, "failed to persist relay state");
            match e {
                Error::Persistence(msg) => Error::Persistence(msg),
                other => Error::Persistence(other.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::CountingStore;
    use async_trait::async_trait;

    async fn fresh() -> (Arc<CountingStore>, RelayDirectory) {
        let store = Arc::new(CountingStore::default());
        let dir = RelayDirectory::open(store.clone()).await;
        (store, dir)
    }

    #[tokio::test]
    async fn resolve_returns_recorded_origin() {
        let (_, dir) = fresh().await;
        dir.record_link(MessageId(50), ChatId(100), MessageId(1), UserId(9000))
            .await
            .unwrap();

        let link = dir.resolve(MessageId(50)).await.unwrap();
        assert_eq!(
            link,
            MessageLink {
                forwarded_id: MessageId(50),
                origin_chat: ChatId(100),
                origin_message_id: MessageId(1),
                operator_id: Some(UserId(9000)),
            }
        );
        assert!(matches!(
            dir.resolve(MessageId(51)).await,
            Err(Error::NotFound(MessageId(51)))
        ));
    }

    #[tokio::test]
    async fn duplicate_forwarded_id_keeps_first_link() {
        let (store, dir) = fresh().await;
        dir.record_link(MessageId(50), ChatId(100), MessageId(1), UserId(9000))
            .await
            .unwrap();

        let err = dir
            .record_link(MessageId(50), ChatId(200), MessageId(2), UserId(9001))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(MessageId(50))));
        assert_eq!(dir.resolve(MessageId(50)).await.unwrap().origin_chat, ChatId(100));
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test]
    async fn mark_replied_is_idempotent_and_writes_once() {
        let (store, dir) = fresh().await;
        assert!(!dir.was_replied(MessageId(1)).await);

        dir.mark_replied(MessageId(1)).await.unwrap();
        let once = dir.snapshot().await;
        dir.mark_replied(MessageId(1)).await.unwrap();

        assert!(dir.was_replied(MessageId(1)).await);
        assert_eq!(dir.snapshot().await, once);
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test]
    async fn every_mutation_is_written_through() {
        let (store, dir) = fresh().await;
        dir.record_link(MessageId(50), ChatId(100), MessageId(1), UserId(9000))
            .await
            .unwrap();
        dir.mark_replied(MessageId(1)).await.unwrap();

        assert_eq!(store.saved().await, dir.snapshot().await);
    }

    #[tokio::test]
    async fn reload_is_observationally_equal() {
        let store = Arc::new(MemoryStore::default());
        let dir = RelayDirectory::open(store.clone()).await;
        dir.record_link(MessageId(50), ChatId(100), MessageId(1), UserId(9000))
            .await
            .unwrap();
        dir.record_link(MessageId(60), ChatId(-300), MessageId(7), UserId(9001))
            .await
            .unwrap();
        dir.mark_replied(MessageId(7)).await.unwrap();

        let reloaded = RelayDirectory::open(store).await;
        assert_eq!(reloaded.snapshot().await, dir.snapshot().await);
        assert_eq!(
            reloaded.resolve(MessageId(60)).await.unwrap(),
            dir.resolve(MessageId(60)).await.unwrap()
        );
        assert!(reloaded.was_replied(MessageId(7)).await);
        assert!(!reloaded.was_replied(MessageId(1)).await);
    }

    #[tokio::test]
    async fn failed_save_reports_error_but_memory_advances() {
        let (store, dir) = fresh().await;
        store.break_saves();

        let err = dir
            .record_link(MessageId(50), ChatId(100), MessageId(1), UserId(9000))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(dir.resolve(MessageId(50)).await.is_ok());

        assert!(dir.mark_replied(MessageId(1)).await.is_err());
        assert!(dir.was_replied(MessageId(1)).await);
    }

    #[tokio::test]
    async fn links_for_origin_collects_every_operator_copy() {
        let (_, dir) = fresh().await;
        dir.record_link(MessageId(50), ChatId(100), MessageId(1), UserId(9000))
            .await
            .unwrap();
        dir.record_link(MessageId(51), ChatId(100), MessageId(1), UserId(9001))
            .await
            .unwrap();
        dir.record_link(MessageId(52), ChatId(100), MessageId(2), UserId(9000))
            .await
            .unwrap();

        let mut ops: Vec<_> = dir
            .links_for_origin(ChatId(100), MessageId(1))
            .await
            .into_iter()
            .filter_map(|l| l.operator_id)
            .collect();
        ops.sort();
        assert_eq!(ops, vec![UserId(9000), UserId(9001)]);
    }

    #[tokio::test]
    async fn concurrent_records_are_not_lost() {
        let store = Arc::new(MemoryStore::default());
        let dir = Arc::new(RelayDirectory::open(store.clone()).await);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let dir = dir.clone();
            tasks.push(tokio::spawn(async move {
                dir.record_link(MessageId(i), ChatId(i as i64), MessageId(i), UserId(1))
                    .await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(dir.len().await, 32);
        assert_eq!(store.load().await.unwrap().links.len(), 32);
    }

    #[tokio::test]
    async fn starts_empty_when_store_is_unreadable() {
        struct Unreadable;

        #[async_trait]
        impl LinkStore for Unreadable {
            fn name(&self) -> &'static str {
                "unreadable"
            }
            async fn load(&self) -> Result<StoreSnapshot> {
                Err(Error::Persistence("boom".to_string()))
            }
            async fn save(&self, _snapshot: &StoreSnapshot) -> Result<()> {
                Ok(())
            }
        }

        let dir = RelayDirectory::open(Arc::new(Unreadable)).await;
        assert!(dir.is_empty().await);
    }
}
