//! Object contexts chained worker -> main -> master -> disk.
//!
//! Each tier buffers its edits in a [`ChangeSet`]. Saving a child tier folds
//! its edits into the parent; saving the master commits them to the disk store.
//! Reads see the committed snapshot with every tier's pending edits overlaid,
//! so a child observes its own unsaved writes and everything saved above it.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::dao::{
    change_set::{ChangeSet, EntityRows, RowId, RowKey, Snapshot, max_row_id},
    disk_store::DiskStore,
    error::{PersistenceError, PersistenceResult},
    models::{Entity, EntityName},
};

/// Position of a context in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Owns the disk store and the committed snapshot.
    Master,
    /// Read-mostly tier backing presentation code.
    Main,
    /// Private tier receiving every insert and update.
    Worker,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Master => "master",
            Tier::Main => "main",
            Tier::Worker => "worker",
        };
        f.write_str(label)
    }
}

/// A decoded row together with its store identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<T> {
    /// Store-wide row identity.
    pub id: RowId,
    /// Decoded row contents.
    pub value: T,
}

enum Backing {
    Parent(Arc<ObjectContext>),
    Disk(Arc<dyn DiskStore>),
}

#[derive(Default)]
struct TierState {
    pending: ChangeSet,
    /// Only populated on the master tier.
    committed: Snapshot,
}

/// One tier of the cache: pending edits over a parent tier or the disk store.
pub struct ObjectContext {
    tier: Tier,
    backing: Backing,
    state: Mutex<TierState>,
    serial: Mutex<()>,
    row_ids: Arc<AtomicU64>,
}

impl ObjectContext {
    /// Build the disk-backed master tier from an already loaded snapshot.
    pub fn master(disk: Arc<dyn DiskStore>, committed: Snapshot) -> Arc<Self> {
        let next_id = max_row_id(&committed) + 1;
        Arc::new(Self {
            tier: Tier::Master,
            backing: Backing::Disk(disk),
            state: Mutex::new(TierState {
                pending: ChangeSet::default(),
                committed,
            }),
            serial: Mutex::new(()),
            row_ids: Arc::new(AtomicU64::new(next_id)),
        })
    }

    /// Create a child tier whose saves land in `self`.
    pub fn child(self: &Arc<Self>, tier: Tier) -> Arc<Self> {
        Arc::new(Self {
            tier,
            backing: Backing::Parent(Arc::clone(self)),
            state: Mutex::new(TierState::default()),
            serial: Mutex::new(()),
            row_ids: Arc::clone(&self.row_ids),
        })
    }

    /// Position of this context in the chain.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Tier receiving this context's saves; `None` on the master.
    pub fn parent(&self) -> Option<&Arc<ObjectContext>> {
        match &self.backing {
            Backing::Parent(parent) => Some(parent),
            Backing::Disk(_) => None,
        }
    }

    /// Serialize a multi-step operation against this tier.
    ///
    /// Hold the returned guard for the whole clear/fill/save sequence. The
    /// helpers in [`crate::dao::access`] never take it themselves.
    pub async fn perform(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().await
    }

    /// Current rows of `entity` as seen from this tier.
    pub async fn rows(&self, entity: EntityName) -> EntityRows {
        let chain = self.chain();
        let mut guards = Vec::with_capacity(chain.len());
        for context in &chain {
            guards.push(context.state.lock().await);
        }

        let mut rows = guards
            .last()
            .and_then(|root| root.committed.get(&entity).cloned())
            .unwrap_or_default();
        for guard in guards.iter().rev() {
            guard.pending.apply_to_rows(entity, &mut rows);
        }
        rows
    }

    /// Decode every visible row of `T`, in row id order.
    pub async fn fetch<T: Entity>(&self) -> PersistenceResult<Vec<Row<T>>> {
        self.rows(T::NAME)
            .await
            .into_iter()
            .map(|(id, raw)| {
                serde_json::from_value(raw)
                    .map(|value| Row { id, value })
                    .map_err(|source| PersistenceError::Decode {
                        entity: T::NAME,
                        row_id: id,
                        source,
                    })
            })
            .collect()
    }

    /// Stage a new row and return its id.
    pub async fn insert<T: Entity>(&self, value: &T) -> PersistenceResult<RowId> {
        let id = self.row_ids.fetch_add(1, Ordering::SeqCst);
        self.put(id, value).await?;
        Ok(id)
    }

    /// Stage an overwrite of row `id`.
    pub async fn put<T: Entity>(&self, id: RowId, value: &T) -> PersistenceResult<()> {
        let raw = serde_json::to_value(value).map_err(|source| PersistenceError::Encode {
            entity: T::NAME,
            source,
        })?;
        self.state.lock().await.pending.upsert((T::NAME, id), raw);
        Ok(())
    }

    /// Stage an already encoded row under a fresh id.
    pub async fn insert_raw(&self, entity: EntityName, raw: Value) -> RowId {
        let id = self.row_ids.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.pending.upsert((entity, id), raw);
        id
    }

    /// Stage removal of one row.
    pub async fn delete(&self, key: RowKey) {
        self.state.lock().await.pending.delete(key);
    }

    /// Stage removal of every row of `entity`.
    pub async fn clear(&self, entity: EntityName) {
        self.state.lock().await.pending.clear(entity);
    }

    /// Whether this tier holds unsaved edits.
    pub async fn has_changes(&self) -> bool {
        !self.state.lock().await.pending.is_empty()
    }

    /// Drop every unsaved edit of this tier.
    pub async fn rollback(&self) {
        let discarded = std::mem::take(&mut self.state.lock().await.pending);
        if !discarded.is_empty() {
            debug!(tier = %self.tier, "discarded pending changes");
        }
    }

    /// Commit this tier's edits one level up.
    ///
    /// On the master tier the edits go to disk; if that fails they stay
    /// pending so a later save can retry them.
    pub async fn save(&self) -> PersistenceResult<()> {
        match &self.backing {
            Backing::Parent(parent) => {
                let mut own = self.state.lock().await;
                if own.pending.is_empty() {
                    return Ok(());
                }
                let mut above = parent.state.lock().await;
                above.pending.merge(std::mem::take(&mut own.pending));
                Ok(())
            }
            Backing::Disk(disk) => {
                let mut own = self.state.lock().await;
                if own.pending.is_empty() {
                    return Ok(());
                }
                disk.commit(own.pending.clone()).await?;
                let changes = std::mem::take(&mut own.pending);
                changes.apply(&mut own.committed);
                Ok(())
            }
        }
    }

    /// Save this tier and then every ancestor up to the disk.
    pub async fn save_cascade(&self) -> PersistenceResult<()> {
        let mut cursor = Some(self);
        while let Some(context) = cursor {
            if let Err(err) = context.save().await {
                warn!(tier = %context.tier, error = %err, "context save failed");
                return Err(err);
            }
            cursor = context.parent().map(Arc::as_ref);
        }
        Ok(())
    }

    fn chain(&self) -> Vec<&ObjectContext> {
        let mut chain = vec![self];
        let mut cursor = self.parent();
        while let Some(context) = cursor {
            chain.push(context.as_ref());
            cursor = context.parent();
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{disk_store::MemoryStore, models::Course};

    fn course(id: i64, code: &str) -> Course {
        Course {
            id,
            course_code: code.into(),
            ..Course::default()
        }
    }

    fn chain(disk: &MemoryStore) -> (Arc<ObjectContext>, Arc<ObjectContext>, Arc<ObjectContext>) {
        let master = ObjectContext::master(Arc::new(disk.clone()), Snapshot::new());
        let main = master.child(Tier::Main);
        let worker = main.child(Tier::Worker);
        (master, main, worker)
    }

    #[tokio::test]
    async fn unsaved_worker_rows_are_private() {
        let disk = MemoryStore::new();
        let (_master, main, worker) = chain(&disk);

        worker.insert(&course(1, "CS101")).await.unwrap();
        assert_eq!(worker.fetch::<Course>().await.unwrap().len(), 1);
        assert!(main.fetch::<Course>().await.unwrap().is_empty());

        worker.save().await.unwrap();
        assert_eq!(main.fetch::<Course>().await.unwrap().len(), 1);
        assert!(disk.snapshot().is_empty());
    }

    #[tokio::test]
    async fn cascade_reaches_disk() {
        let disk = MemoryStore::new();
        let (master, _main, worker) = chain(&disk);

        worker.insert(&course(1, "CS101")).await.unwrap();
        worker.save_cascade().await.unwrap();

        assert_eq!(disk.snapshot()[&EntityName::Course].len(), 1);
        assert!(!master.has_changes().await);
    }

    #[tokio::test]
    async fn failed_disk_commit_keeps_master_pending() {
        let disk = MemoryStore::new();
        disk.reject_commits(true);
        let (master, main, worker) = chain(&disk);

        worker.insert(&course(1, "CS101")).await.unwrap();
        assert!(worker.save_cascade().await.is_err());

        assert!(!worker.has_changes().await);
        assert!(!main.has_changes().await);
        assert!(master.has_changes().await);
        assert!(disk.snapshot().is_empty());

        disk.reject_commits(false);
        master.save().await.unwrap();
        assert_eq!(disk.snapshot()[&EntityName::Course].len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_worker_edits() {
        let disk = MemoryStore::new();
        let (_master, _main, worker) = chain(&disk);

        worker.insert(&course(1, "CS101")).await.unwrap();
        worker.rollback().await;
        assert!(worker.fetch::<Course>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn row_ids_continue_after_committed_rows() {
        let mut committed = Snapshot::new();
        committed.insert(
            EntityName::Course,
            [(41, serde_json::to_value(course(1, "CS101")).unwrap())]
                .into_iter()
                .collect(),
        );
        let master = ObjectContext::master(Arc::new(MemoryStore::new()), committed);
        let worker = master.child(Tier::Main).child(Tier::Worker);

        let id = worker.insert(&course(2, "CS102")).await.unwrap();
        assert_eq!(id, 42);
    }
}
