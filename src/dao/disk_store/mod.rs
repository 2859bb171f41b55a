/// SQLite-backed store.
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;

use crate::dao::{
    change_set::{ChangeSet, Snapshot},
    models::EntityName,
    storage::{StorageError, StorageResult},
};

/// Bumped whenever an entity's stored shape changes incompatibly.
pub const SCHEMA_REVISION: u32 = 3;

/// Fingerprint of the compiled schema; a stored value that differs means the
/// file on disk cannot be read by this build.
pub fn schema_fingerprint() -> String {
    let names = EntityName::ALL
        .iter()
        .map(EntityName::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!("r{SCHEMA_REVISION}:{names}")
}

/// Durable backend owned by the master context tier.
pub trait DiskStore: Send + Sync {
    /// Read every committed row.
    fn load(&self) -> BoxFuture<'static, StorageResult<Snapshot>>;
    /// Persist a change set as a single transaction.
    fn commit(&self, changes: ChangeSet) -> BoxFuture<'static, StorageResult<()>>;
}

/// Volatile store used by tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Snapshot>>,
    reject_commits: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail until switched back.
    pub fn reject_commits(&self, reject: bool) {
        self.reject_commits.store(reject, Ordering::SeqCst);
    }

    /// Copy of the committed rows.
    pub fn snapshot(&self) -> Snapshot {
        self.rows
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl DiskStore for MemoryStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Snapshot>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.snapshot()) })
    }

    fn commit(&self, changes: ChangeSet) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if store.reject_commits.load(Ordering::SeqCst) {
                return Err(StorageError::CommitRejected {
                    message: "memory store is read-only".into(),
                });
            }
            let mut guard = store.rows.lock().map_err(|_| StorageError::CommitRejected {
                message: "memory store lock poisoned".into(),
            })?;
            changes.apply(&mut guard);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_commits_and_rejects() {
        let store = MemoryStore::new();
        let mut changes = ChangeSet::default();
        changes.upsert((EntityName::Course, 1), json!({"id": 1}));
        store.commit(changes.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap()[&EntityName::Course].len(), 1);

        store.reject_commits(true);
        let err = store.commit(changes).await.unwrap_err();
        assert!(matches!(err, StorageError::CommitRejected { .. }));
    }

    #[test]
    fn fingerprint_lists_every_entity() {
        let fingerprint = schema_fingerprint();
        assert!(fingerprint.starts_with("r3:User,Course,"));
        assert!(fingerprint.ends_with("DeepCopySidekick"));
    }
}
