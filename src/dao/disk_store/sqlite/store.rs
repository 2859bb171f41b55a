use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use futures::future::BoxFuture;
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};
use tracing::{info, warn};

use super::error::{SqliteDaoError, SqliteResult};
use crate::dao::{
    change_set::{ChangeSet, RowId, Snapshot},
    disk_store::{DiskStore, schema_fingerprint},
    models::EntityName,
    storage::StorageResult,
};

/// Disk-backed store keeping one SQLite row per cached entity row.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    path: Arc<Path>,
}

impl SqliteStore {
    /// Open the store file, recreating it empty when it was written by an
    /// incompatible schema.
    pub async fn open(path: impl Into<PathBuf>) -> SqliteResult<Self> {
        let path: PathBuf = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SqliteDaoError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let pool = connect(&path).await?;
        ensure_schema(&pool).await?;

        let expected = schema_fingerprint();
        let stored = stored_fingerprint(&pool).await?;
        let populated = row_count(&pool).await? > 0;
        let pool = match stored {
            Some(found) if found == expected => pool,
            None if !populated => {
                write_fingerprint(&pool, &expected).await?;
                pool
            }
            found => {
                warn!(
                    path = %path.display(),
                    stored = ?found,
                    "store schema mismatch; deleting store file"
                );
                pool.close().await;
                remove_store_files(&path).await?;
                let pool = connect(&path).await?;
                ensure_schema(&pool).await?;
                write_fingerprint(&pool, &expected).await?;
                pool
            }
        };

        info!(path = %path.display(), "opened SQLite store");
        Ok(Self {
            pool,
            path: Arc::from(path.as_path()),
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_rows(&self) -> SqliteResult<Snapshot> {
        let rows = sqlx::query("SELECT row_id, entity, body FROM rows")
            .fetch_all(&self.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "load",
                source,
            })?;

        let mut snapshot = Snapshot::new();
        for row in rows {
            let row_id: i64 = row.get("row_id");
            let entity: String = row.get("entity");
            let body: String = row.get("body");

            let name = EntityName::from_str(&entity)
                .map_err(|_| SqliteDaoError::UnknownEntity { row_id, entity })?;
            let value = serde_json::from_str(&body)
                .map_err(|source| SqliteDaoError::DecodeRow { row_id, source })?;
            snapshot
                .entry(name)
                .or_default()
                .insert(row_id as RowId, value);
        }
        Ok(snapshot)
    }

    async fn commit_changes(&self, changes: ChangeSet) -> SqliteResult<()> {
        let mut tx = self.pool.begin().await.map_err(query_err("begin"))?;

        for entity in changes.cleared() {
            sqlx::query("DELETE FROM rows WHERE entity = ?")
                .bind(entity.as_str())
                .execute(&mut *tx)
                .await
                .map_err(query_err("clear"))?;
        }

        for (_, row_id) in changes.deleted() {
            sqlx::query("DELETE FROM rows WHERE row_id = ?")
                .bind(sql_row_id(row_id)?)
                .execute(&mut *tx)
                .await
                .map_err(query_err("delete"))?;
        }

        for ((entity, row_id), value) in changes.upserts() {
            sqlx::query("INSERT OR REPLACE INTO rows (row_id, entity, body) VALUES (?, ?, ?)")
                .bind(sql_row_id(row_id)?)
                .bind(entity.as_str())
                .bind(value.to_string())
                .execute(&mut *tx)
                .await
                .map_err(query_err("upsert"))?;
        }

        tx.commit().await.map_err(query_err("commit"))
    }
}

impl DiskStore for SqliteStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Snapshot>> {
        let store = self.clone();
        Box::pin(async move { store.load_rows().await.map_err(Into::into) })
    }

    fn commit(&self, changes: ChangeSet) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit_changes(changes).await.map_err(Into::into) })
    }
}

async fn connect(path: &Path) -> SqliteResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|source| SqliteDaoError::Connect {
            path: path.to_path_buf(),
            source,
        })
}

async fn ensure_schema(pool: &SqlitePool) -> SqliteResult<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_fingerprint TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS rows (
            row_id INTEGER PRIMARY KEY,
            entity TEXT NOT NULL,
            body TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_rows_entity ON rows(entity)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|source| SqliteDaoError::Schema { source })?;
    }
    Ok(())
}

async fn stored_fingerprint(pool: &SqlitePool) -> SqliteResult<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT schema_fingerprint FROM meta WHERE id = 1")
        .fetch_optional(pool)
        .await
        .map_err(|source| SqliteDaoError::Query {
            operation: "read fingerprint",
            source,
        })
}

async fn write_fingerprint(pool: &SqlitePool, fingerprint: &str) -> SqliteResult<()> {
    sqlx::query("INSERT OR REPLACE INTO meta (id, schema_fingerprint) VALUES (1, ?)")
        .bind(fingerprint)
        .execute(pool)
        .await
        .map_err(|source| SqliteDaoError::Query {
            operation: "write fingerprint",
            source,
        })?;
    Ok(())
}

async fn row_count(pool: &SqlitePool) -> SqliteResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rows")
        .fetch_one(pool)
        .await
        .map_err(|source| SqliteDaoError::Query {
            operation: "count",
            source,
        })
}

async fn remove_store_files(path: &Path) -> SqliteResult<()> {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        candidates.push(PathBuf::from(sidecar));
    }

    for candidate in candidates {
        match tokio::fs::remove_file(&candidate).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SqliteDaoError::RemoveFile {
                    path: candidate,
                    source,
                });
            }
        }
    }
    Ok(())
}

fn query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> SqliteDaoError {
    move |source| SqliteDaoError::Query { operation, source }
}

fn sql_row_id(row_id: RowId) -> SqliteResult<i64> {
    i64::try_from(row_id).map_err(|_| SqliteDaoError::RowIdRange { row_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn commit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.path(), path.as_path());
        let mut changes = ChangeSet::default();
        changes.upsert((EntityName::Course, 1), json!({"id": 11, "course_code": "CS101"}));
        changes.upsert((EntityName::Course, 2), json!({"id": 12, "course_code": "CS102"}));
        store.commit(changes).await.unwrap();
        store.pool.close().await;

        let reopened = SqliteStore::open(&path).await.unwrap();
        let snapshot = reopened.load().await.unwrap();
        assert_eq!(snapshot[&EntityName::Course].len(), 2);
        assert_eq!(snapshot[&EntityName::Course][&1]["course_code"], "CS101");
    }

    #[tokio::test]
    async fn clear_removes_entity_rows_only() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("cache.sqlite"))
            .await
            .unwrap();

        let mut seed = ChangeSet::default();
        seed.upsert((EntityName::Course, 1), json!({"id": 1}));
        seed.upsert((EntityName::User, 2), json!({"id": 2}));
        store.commit(seed).await.unwrap();

        let mut refresh = ChangeSet::default();
        refresh.clear(EntityName::Course);
        refresh.upsert((EntityName::Course, 3), json!({"id": 3}));
        store.commit(refresh).await.unwrap();

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot[&EntityName::Course].keys().collect::<Vec<_>>(), vec![&3]);
        assert_eq!(snapshot[&EntityName::User].len(), 1);
    }

    #[tokio::test]
    async fn schema_mismatch_recreates_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.sqlite");

        let store = SqliteStore::open(&path).await.unwrap();
        let mut changes = ChangeSet::default();
        changes.upsert((EntityName::User, 1), json!({"id": 1}));
        store.commit(changes).await.unwrap();
        write_fingerprint(&store.pool, "r0:legacy").await.unwrap();
        store.pool.close().await;

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert!(reopened.load().await.unwrap().is_empty());
        assert_eq!(
            stored_fingerprint(&reopened.pool).await.unwrap(),
            Some(schema_fingerprint())
        );
    }

    #[tokio::test]
    async fn unusable_parent_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("occupied");
        tokio::fs::write(&blocker, b"not a directory").await.unwrap();

        let result = SqliteStore::open(blocker.join("nested").join("cache.sqlite")).await;
        match result {
            Err(SqliteDaoError::CreateDir { path, .. }) => {
                assert_eq!(path, blocker.join("nested"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("store opened under a regular file"),
        }
    }
}
