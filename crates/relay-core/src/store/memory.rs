use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LinkStore, StoreSnapshot};
use crate::Result;

/// Process-local store. State survives directory rebuilds, not restarts.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<StoreSnapshot>,
}

#[async_trait]
impl LinkStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        Ok(self.saved.lock().await.clone())
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        *self.saved.lock().await = snapshot.clone();
        Ok(())
    }
}
