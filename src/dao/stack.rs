use std::{path::Path, sync::Arc};

use tracing::{info, warn};

use crate::dao::{
    context::{ObjectContext, Tier},
    disk_store::DiskStore,
    error::PersistenceResult,
};

/// The three chained context tiers sharing one disk store.
#[derive(Clone)]
pub struct PersistenceStack {
    master: Arc<ObjectContext>,
    main: Arc<ObjectContext>,
    worker: Arc<ObjectContext>,
}

impl PersistenceStack {
    /// Load the committed rows from `disk` and build the tier chain on top.
    pub async fn with_store(disk: Arc<dyn DiskStore>) -> PersistenceResult<Self> {
        let snapshot = disk.load().await?;
        let rows = snapshot.values().map(|rows| rows.len()).sum::<usize>();
        let master = ObjectContext::master(disk, snapshot);
        let main = master.child(Tier::Main);
        let worker = main.child(Tier::Worker);
        info!(rows, "persistence stack ready");
        Ok(Self {
            master,
            main,
            worker,
        })
    }

    /// Open the SQLite store file at `path`.
    #[cfg(feature = "sqlite-store")]
    pub async fn open(path: &Path) -> PersistenceResult<Self> {
        use crate::dao::disk_store::sqlite::SqliteStore;

        let store = SqliteStore::open(path)
            .await
            .map_err(crate::dao::storage::StorageError::from)?;
        Self::with_store(Arc::new(store)).await
    }

    /// Ephemeral stack when the crate is built without a disk backend.
    #[cfg(not(feature = "sqlite-store"))]
    pub async fn open(path: &Path) -> PersistenceResult<Self> {
        use crate::dao::disk_store::MemoryStore;

        warn!(path = %path.display(), "no disk backend compiled in; using memory store");
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    /// Disk-backed tier.
    pub fn master(&self) -> &Arc<ObjectContext> {
        &self.master
    }

    /// Context read by presentation code.
    pub fn main(&self) -> &Arc<ObjectContext> {
        &self.main
    }

    /// Context used for every insert and update.
    pub fn worker(&self) -> &Arc<ObjectContext> {
        &self.worker
    }
}

/// Save `ctx` and every ancestor, reporting the first failing tier.
pub async fn cascade_save(ctx: &ObjectContext) -> PersistenceResult<()> {
    ctx.save_cascade().await
}

/// Save `ctx` and every ancestor; `true` only when all tiers saved.
pub async fn save_object_context(ctx: &ObjectContext) -> bool {
    match ctx.save_cascade().await {
        Ok(()) => true,
        Err(err) => {
            warn!(tier = %ctx.tier(), error = %err, "cascading save failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        disk_store::MemoryStore,
        models::{Course, EntityName},
    };

    #[tokio::test]
    async fn worker_save_propagates_to_main_and_master() {
        let disk = MemoryStore::new();
        let stack = PersistenceStack::with_store(Arc::new(disk.clone()))
            .await
            .unwrap();

        stack.worker().insert(&Course::default()).await.unwrap();
        assert!(save_object_context(stack.worker()).await);

        assert_eq!(stack.main().fetch::<Course>().await.unwrap().len(), 1);
        assert_eq!(stack.master().fetch::<Course>().await.unwrap().len(), 1);
        assert_eq!(disk.snapshot()[&EntityName::Course].len(), 1);
    }

    #[tokio::test]
    async fn master_failure_reports_false() {
        let disk = MemoryStore::new();
        let stack = PersistenceStack::with_store(Arc::new(disk.clone()))
            .await
            .unwrap();
        disk.reject_commits(true);

        stack.worker().insert(&Course::default()).await.unwrap();
        assert!(!save_object_context(stack.worker()).await);

        assert!(!stack.worker().has_changes().await);
        assert!(disk.snapshot().is_empty());
    }

    #[cfg(feature = "sqlite-store")]
    #[tokio::test]
    async fn reopened_stack_sees_saved_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");

        let stack = PersistenceStack::open(&path).await.unwrap();
        stack
            .worker()
            .insert(&Course {
                id: 5,
                ..Course::default()
            })
            .await
            .unwrap();
        assert!(save_object_context(stack.worker()).await);
        drop(stack);

        let reopened = PersistenceStack::open(&path).await.unwrap();
        let courses = reopened.main().fetch::<Course>().await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].value.id, 5);
    }
}
