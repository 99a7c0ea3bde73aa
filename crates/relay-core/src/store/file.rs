use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{LinkStore, StoreSnapshot};
use crate::{errors::Error, Result};

/// JSON file on local disk.
///
/// Saves go to a sibling `*.tmp` file that is then renamed over the target,
/// so readers see either the old or the new document.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LinkStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no relay state file yet");
                return Ok(StoreSnapshot::default());
            }
            Err(e) => return Err(Error::Persistence(format!("{}: {e}", self.path.display()))),
        };

        match StoreSnapshot::from_json(&bytes) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                // Keep the unreadable document around; the next save would overwrite it.
                let aside = self.corrupt_path();
                if let Err(copy_err) = tokio::fs::copy(&self.path, &aside).await {
                    warn!(path = %aside.display(), error = %copy_err, "could not keep corrupt state file");
                }
                Err(Error::Persistence(format!("{}: {e}", self.path.display())))
            }
        }
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let bytes = snapshot.to_json()?;
        let tmp = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Persistence(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, UserId};
    use crate::store::LinkEntry;

    fn tmp_file(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "relay-{prefix}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let store = FileStore::new(tmp_file("missing"));
        assert_eq!(store.load().await.unwrap(), StoreSnapshot::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let path = tmp_file("roundtrip");
        let store = FileStore::new(&path);

        let mut snap = StoreSnapshot::default();
        snap.links.insert(
            MessageId(11),
            LinkEntry::Routed(ChatId(100), MessageId(1), UserId(9000)),
        );
        snap.links
            .insert(MessageId(12), LinkEntry::Legacy(ChatId(-5), MessageId(2)));
        snap.replied.insert(MessageId(1));

        store.save(&snap).await.unwrap();
        assert!(!store.tmp_path().exists());

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), snap);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_file_errors_and_is_kept_aside() {
        let path = tmp_file("corrupt");
        std::fs::write(&path, "{\"links\": [").unwrap();
        let store = FileStore::new(&path);

        assert!(matches!(store.load().await, Err(Error::Persistence(_))));
        assert_eq!(store.load_or_empty().await, StoreSnapshot::default());
        assert!(store.corrupt_path().exists());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(store.corrupt_path());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tmp_file("nested");
        let path = dir.join("state").join("relay.json");
        let store = FileStore::new(&path);

        store.save(&StoreSnapshot::default()).await.unwrap();
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
