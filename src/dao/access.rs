//! Typed fetch/insert/update helpers on top of an [`ObjectContext`].
//!
//! None of these take the context's `perform` gate; callers running a
//! multi-step sequence hold it around the whole sequence.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::debug;

use crate::dao::{
    context::{ObjectContext, Row},
    error::{PersistenceError, PersistenceResult},
    models::{Entity, EntityName},
};

/// Row predicate evaluated against decoded rows.
pub struct Filter<T> {
    test: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: 'static> Filter<T> {
    /// Match every row.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    /// Match rows for which `test` holds.
    pub fn new(test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            test: Box::new(test),
        }
    }

    /// Match rows whose `key` equals `value`.
    pub fn eq<K>(key: fn(&T) -> K, value: K) -> Self
    where
        K: PartialEq + Send + Sync + 'static,
    {
        Self::new(move |row| key(row) == value)
    }

    /// Both predicates must hold.
    pub fn and(self, other: Filter<T>) -> Self {
        Self::new(move |row| (self.test)(row) && (other.test)(row))
    }

    /// Whether `row` passes the predicate.
    pub fn matches(&self, row: &T) -> bool {
        (self.test)(row)
    }
}

/// Ordering applied to fetched rows.
pub struct Sort<T> {
    compare: Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
}

impl<T: 'static> Sort<T> {
    /// Order rows with `compare`.
    pub fn by(compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            compare: Box::new(compare),
        }
    }

    /// Ascending order of `key`.
    pub fn by_key<K: Ord + 'static>(key: fn(&T) -> K) -> Self {
        Self::by(move |left, right| key(left).cmp(&key(right)))
    }

    fn apply(&self, rows: &mut [Row<T>]) {
        rows.sort_by(|left, right| (self.compare)(&left.value, &right.value));
    }
}

/// Matching rows with their ids, in row id order unless `sort` is given.
pub async fn retrieve_rows<T: Entity>(
    ctx: &ObjectContext,
    filter: &Filter<T>,
    sort: Option<&Sort<T>>,
) -> PersistenceResult<Vec<Row<T>>> {
    let mut rows = ctx
        .fetch::<T>()
        .await?
        .into_iter()
        .filter(|row| filter.matches(&row.value))
        .collect::<Vec<_>>();
    if let Some(sort) = sort {
        sort.apply(&mut rows);
    }
    Ok(rows)
}

/// Matching row values. An empty vector means no rows, never a failure.
pub async fn retrieve_objects<T: Entity>(
    ctx: &ObjectContext,
    filter: &Filter<T>,
    sort: Option<&Sort<T>>,
) -> PersistenceResult<Vec<T>> {
    Ok(retrieve_rows(ctx, filter, sort)
        .await?
        .into_iter()
        .map(|row| row.value)
        .collect())
}

/// First matching row after sorting.
pub async fn retrieve_object<T: Entity>(
    ctx: &ObjectContext,
    filter: &Filter<T>,
    sort: Option<&Sort<T>>,
) -> PersistenceResult<Option<T>> {
    Ok(retrieve_objects(ctx, filter, sort).await?.into_iter().next())
}

/// Get-or-create: the single matching row, or a freshly inserted blank row.
///
/// More than one match is reported as [`PersistenceError::Ambiguous`].
pub async fn retrieve_entity<T: Entity>(
    ctx: &ObjectContext,
    filter: &Filter<T>,
) -> PersistenceResult<Row<T>> {
    let mut matches = retrieve_rows(ctx, filter, None).await?;
    match matches.len() {
        0 => {
            let value = T::default();
            let id = ctx.insert(&value).await?;
            Ok(Row { id, value })
        }
        1 => Ok(matches.remove(0)),
        count => Err(PersistenceError::Ambiguous {
            entity: T::NAME,
            matches: count,
        }),
    }
}

/// Clear every named entity set in one change set and save down to disk.
pub async fn clear_entities(ctx: &ObjectContext, names: &[EntityName]) -> PersistenceResult<()> {
    for name in names {
        ctx.clear(*name).await;
    }
    ctx.save_cascade().await?;
    debug!(entities = ?names, "cleared entity sets");
    Ok(())
}

/// Apply `patch` to every matching row and save; returns the rows touched.
pub async fn update_objects<T: Entity>(
    ctx: &ObjectContext,
    filter: &Filter<T>,
    mut patch: impl FnMut(&mut T),
) -> PersistenceResult<usize> {
    let rows = retrieve_rows(ctx, filter, None).await?;
    let touched = rows.len();
    for Row { id, mut value } in rows {
        patch(&mut value);
        ctx.put(id, &value).await?;
    }
    ctx.save_cascade().await?;
    Ok(touched)
}

/// Delete every matching row and save; returns the rows removed.
pub async fn delete_objects<T: Entity>(
    ctx: &ObjectContext,
    filter: &Filter<T>,
) -> PersistenceResult<usize> {
    let rows = retrieve_rows(ctx, filter, None).await?;
    let removed = rows.len();
    for row in rows {
        ctx.delete((T::NAME, row.id)).await;
    }
    ctx.save_cascade().await?;
    Ok(removed)
}

/// Typed rows staged for [`replace_all`].
#[derive(Default)]
pub struct RowBatch {
    clear: Vec<EntityName>,
    rows: Vec<(EntityName, Value)>,
}

impl RowBatch {
    /// A batch that replaces the given entity sets.
    pub fn replacing(names: &[EntityName]) -> Self {
        Self {
            clear: names.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Stage `value` as a new row of its entity set.
    pub fn push<T: Entity>(&mut self, value: &T) -> PersistenceResult<()> {
        let raw = serde_json::to_value(value).map_err(|source| PersistenceError::Encode {
            entity: T::NAME,
            source,
        })?;
        self.rows.push((T::NAME, raw));
        Ok(())
    }

    /// Rows staged across every entity set.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of rows staged for `entity`.
    pub fn count(&self, entity: EntityName) -> usize {
        self.rows.iter().filter(|(name, _)| *name == entity).count()
    }

    /// No rows staged; the clears still apply.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Clear the batch's entity sets, insert its rows and save down to disk.
///
/// The clear and the inserts travel up the chain as one change set, so no
/// tier ever observes a cleared set without its replacement rows. A failed
/// disk commit leaves the whole set pending in the master tier, where the
/// next successful save writes it out.
pub async fn replace_all(ctx: &ObjectContext, batch: RowBatch) -> PersistenceResult<usize> {
    let RowBatch { clear, rows } = batch;
    for name in &clear {
        ctx.clear(*name).await;
    }
    let inserted = rows.len();
    for (name, raw) in rows {
        ctx.insert_raw(name, raw).await;
    }

    ctx.save_cascade().await?;
    debug!(entities = ?clear, count = inserted, "replaced entity sets");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::{
        change_set::Snapshot,
        context::Tier,
        disk_store::MemoryStore,
        models::{Course, GameClue},
    };

    fn worker() -> (MemoryStore, Arc<ObjectContext>) {
        let disk = MemoryStore::new();
        let master = ObjectContext::master(Arc::new(disk.clone()), Snapshot::new());
        let worker = master.child(Tier::Main).child(Tier::Worker);
        (disk, worker)
    }

    fn clue(game_id: i64, order: i64) -> GameClue {
        GameClue {
            game_id,
            clue_id: game_id * 10 + order,
            order,
            ..GameClue::default()
        }
    }

    #[tokio::test]
    async fn get_or_create_inserts_then_reuses() {
        let (_disk, ctx) = worker();
        let filter = Filter::<Course>::all();

        let first = retrieve_entity(&ctx, &filter).await.unwrap();
        assert_eq!(first.value, Course::default());
        let second = retrieve_entity(&ctx, &filter).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(ctx.fetch::<Course>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_rejects_ambiguous_matches() {
        let (_disk, ctx) = worker();
        ctx.insert(&Course::default()).await.unwrap();
        ctx.insert(&Course::default()).await.unwrap();

        let err = retrieve_entity(&ctx, &Filter::<Course>::all())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Ambiguous {
                entity: EntityName::Course,
                matches: 2
            }
        ));
    }

    #[tokio::test]
    async fn filtered_sorted_fetch() {
        let (_disk, ctx) = worker();
        for (game, order) in [(1, 3), (2, 1), (1, 1), (1, 2)] {
            ctx.insert(&clue(game, order)).await.unwrap();
        }

        let filter = Filter::eq(|row: &GameClue| row.game_id, 1);
        let sort = Sort::by_key(|row: &GameClue| row.order);
        let orders: Vec<i64> = retrieve_objects(&ctx, &filter, Some(&sort))
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.order)
            .collect();
        assert_eq!(orders, vec![1, 2, 3]);

        let none = retrieve_object(&ctx, &Filter::eq(|row: &GameClue| row.game_id, 9), None)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn update_objects_patches_matches_and_saves() {
        let (disk, ctx) = worker();
        ctx.insert(&clue(1, 1)).await.unwrap();
        ctx.insert(&clue(1, 2)).await.unwrap();
        ctx.insert(&clue(2, 1)).await.unwrap();

        let touched = update_objects(
            &ctx,
            &Filter::eq(|row: &GameClue| row.game_id, 1),
            |row| row.is_done = true,
        )
        .await
        .unwrap();
        assert_eq!(touched, 2);

        let done = retrieve_objects(&ctx, &Filter::new(|row: &GameClue| row.is_done), None)
            .await
            .unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(disk.snapshot()[&EntityName::GameClue].len(), 3);
    }

    #[tokio::test]
    async fn delete_objects_removes_only_matches() {
        let (disk, ctx) = worker();
        ctx.insert(&clue(1, 1)).await.unwrap();
        ctx.insert(&clue(2, 1)).await.unwrap();

        let removed = delete_objects(&ctx, &Filter::eq(|row: &GameClue| row.game_id, 2))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let left = ctx.fetch::<GameClue>().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].value.game_id, 1);
        assert_eq!(disk.snapshot()[&EntityName::GameClue].len(), 1);
    }

    #[tokio::test]
    async fn replace_all_swaps_the_set() {
        let (disk, ctx) = worker();
        for id in 1..=3 {
            ctx.insert(&Course {
                id,
                ..Course::default()
            })
            .await
            .unwrap();
        }
        ctx.save_cascade().await.unwrap();

        let mut batch = RowBatch::replacing(&[EntityName::Course]);
        batch.push(&Course { id: 7, ..Course::default() }).unwrap();
        assert_eq!(replace_all(&ctx, batch).await.unwrap(), 1);

        let ids: Vec<i64> = retrieve_objects(&ctx, &Filter::<Course>::all(), None)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec![7]);
        assert_eq!(disk.snapshot()[&EntityName::Course].len(), 1);
    }

    #[tokio::test]
    async fn failed_replace_stays_pending_in_master() {
        let disk = MemoryStore::new();
        let master = ObjectContext::master(Arc::new(disk.clone()), Snapshot::new());
        let worker = master.child(Tier::Main).child(Tier::Worker);
        disk.reject_commits(true);

        let mut batch = RowBatch::replacing(&[EntityName::Course]);
        batch.push(&Course { id: 4, ..Course::default() }).unwrap();
        assert!(replace_all(&worker, batch).await.is_err());
        assert!(!worker.has_changes().await);
        assert!(master.has_changes().await);
        assert_eq!(worker.fetch::<Course>().await.unwrap().len(), 1);
        assert!(disk.snapshot().is_empty());

        disk.reject_commits(false);
        master.save().await.unwrap();
        assert_eq!(disk.snapshot()[&EntityName::Course].len(), 1);
    }

    #[tokio::test]
    async fn clear_entities_empties_each_set() {
        let (disk, ctx) = worker();
        ctx.insert(&Course::default()).await.unwrap();
        ctx.insert(&clue(1, 1)).await.unwrap();
        ctx.save_cascade().await.unwrap();

        clear_entities(&ctx, &[EntityName::Course, EntityName::GameClue])
            .await
            .unwrap();
        assert!(disk.snapshot().is_empty());
    }
}
