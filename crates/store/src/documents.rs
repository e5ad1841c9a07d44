//! In-memory document store with JSON snapshot persistence.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use pipeline::{DocumentStore, PitchError, Record};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::StoreError;

/// Collection name → record id → record. This is also the snapshot file format.
pub type Snapshot = BTreeMap<String, BTreeMap<String, Record>>;

/// A [`DocumentStore`] held entirely in memory.
///
/// Updates merge field by field with last-writer-wins semantics.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<Snapshot>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            collections: RwLock::new(snapshot),
        }
    }

    /// Reads a snapshot file. A missing file yields an empty store.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no snapshot found, starting empty");
                return Ok(Self::new());
            }
            Err(err) => return Err(StoreError::io(path, err)),
        };
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            collections = snapshot.len(),
            records = snapshot.values().map(BTreeMap::len).sum::<usize>(),
            "snapshot loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Writes the current contents to `path` as pretty-printed JSON.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(&*self.collections.read().await)?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|err| StoreError::io(path, err))?;
        debug!("snapshot written");
        Ok(())
    }

    /// A copy of every collection.
    pub async fn snapshot(&self) -> Snapshot {
        self.collections.read().await.clone()
    }

    /// Inserts or replaces a whole record.
    pub async fn insert(&self, collection: &str, id: &str, record: Record) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, PitchError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, PitchError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|r| r.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, fields: Record) -> Result<(), PitchError> {
        let mut collections = self.collections.write().await;
        let record = collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        debug!(collection, id, fields = fields.len(), "updating record");
        record.extend(fields);
        Ok(())
    }
}
