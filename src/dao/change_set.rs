use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::dao::models::EntityName;

/// Store-assigned identity of a row, unique across every entity set.
pub type RowId = u64;
/// Fully qualified row address.
pub type RowKey = (EntityName, RowId);
/// Rows of a single entity set keyed by row id.
pub type EntityRows = BTreeMap<RowId, Value>;
/// Committed contents of the whole store.
pub type Snapshot = BTreeMap<EntityName, EntityRows>;

/// Pending edits held by a context tier until it is saved into its parent.
///
/// Applying a change set clears whole entity sets first, then drops deleted
/// rows, then writes upserted rows. `merge` keeps that order valid when a
/// newer change set is stacked on an older one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    cleared: BTreeSet<EntityName>,
    deleted: BTreeSet<RowKey>,
    upserts: BTreeMap<RowKey, Value>,
}

impl ChangeSet {
    /// No clear, delete or upsert is pending.
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty() && self.deleted.is_empty() && self.upserts.is_empty()
    }

    /// Drop every row of `entity`, including ones upserted earlier in this set.
    pub fn clear(&mut self, entity: EntityName) {
        self.upserts.retain(|(name, _), _| *name != entity);
        self.deleted.retain(|(name, _)| *name != entity);
        self.cleared.insert(entity);
    }

    /// Remove one row.
    pub fn delete(&mut self, key: RowKey) {
        self.upserts.remove(&key);
        self.deleted.insert(key);
    }

    /// Insert or overwrite one row.
    pub fn upsert(&mut self, key: RowKey, value: Value) {
        self.deleted.remove(&key);
        self.upserts.insert(key, value);
    }

    /// Stack `newer` on top of `self`.
    pub fn merge(&mut self, newer: ChangeSet) {
        for entity in newer.cleared {
            self.clear(entity);
        }
        for key in newer.deleted {
            self.delete(key);
        }
        for (key, value) in newer.upserts {
            self.upsert(key, value);
        }
    }

    /// Apply the edits touching `entity` to its rows.
    pub fn apply_to_rows(&self, entity: EntityName, rows: &mut EntityRows) {
        if self.cleared.contains(&entity) {
            rows.clear();
        }
        for (_, row_id) in self.deleted.range(entity_range(entity)) {
            rows.remove(row_id);
        }
        for ((_, row_id), value) in self.upserts.range(entity_range(entity)) {
            rows.insert(*row_id, value.clone());
        }
    }

    /// Apply every edit to a full snapshot.
    pub fn apply(&self, snapshot: &mut Snapshot) {
        for entity in self.touched_entities() {
            let rows = snapshot.entry(entity).or_default();
            self.apply_to_rows(entity, rows);
            if rows.is_empty() {
                snapshot.remove(&entity);
            }
        }
    }

    /// Entity sets affected by this change set.
    pub fn touched_entities(&self) -> BTreeSet<EntityName> {
        self.cleared
            .iter()
            .copied()
            .chain(self.deleted.iter().map(|(name, _)| *name))
            .chain(self.upserts.keys().map(|(name, _)| *name))
            .collect()
    }

    /// Entity sets cleared by this change set.
    pub fn cleared(&self) -> impl Iterator<Item = EntityName> + '_ {
        self.cleared.iter().copied()
    }

    /// Rows deleted by this change set.
    pub fn deleted(&self) -> impl Iterator<Item = RowKey> + '_ {
        self.deleted.iter().copied()
    }

    /// Rows written by this change set.
    pub fn upserts(&self) -> impl Iterator<Item = (RowKey, &Value)> + '_ {
        self.upserts.iter().map(|(key, value)| (*key, value))
    }
}

fn entity_range(entity: EntityName) -> std::ops::RangeInclusive<RowKey> {
    (entity, RowId::MIN)..=(entity, RowId::MAX)
}

/// Highest row id present in a snapshot, `0` when empty.
pub fn max_row_id(snapshot: &Snapshot) -> RowId {
    snapshot
        .values()
        .filter_map(|rows| rows.keys().next_back().copied())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(entity: EntityName, rows: &[(RowId, Value)]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(entity, rows.iter().cloned().collect());
        snapshot
    }

    #[test]
    fn clear_then_upsert_keeps_only_new_rows() {
        let mut snapshot = snapshot_with(
            EntityName::Course,
            &[(1, json!({"id": 1})), (2, json!({"id": 2}))],
        );

        let mut changes = ChangeSet::default();
        changes.clear(EntityName::Course);
        changes.upsert((EntityName::Course, 3), json!({"id": 3}));
        changes.apply(&mut snapshot);

        let rows = &snapshot[&EntityName::Course];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[&3], json!({"id": 3}));
    }

    #[test]
    fn merge_newer_clear_discards_older_upserts() {
        let mut older = ChangeSet::default();
        older.upsert((EntityName::User, 4), json!({"id": 4}));
        older.upsert((EntityName::Course, 5), json!({"id": 5}));

        let mut newer = ChangeSet::default();
        newer.clear(EntityName::User);
        newer.upsert((EntityName::User, 6), json!({"id": 6}));
        older.merge(newer);

        let upserted: Vec<_> = older.upserts().map(|(key, _)| key).collect();
        assert_eq!(
            upserted,
            vec![(EntityName::User, 6), (EntityName::Course, 5)]
        );
        assert_eq!(older.cleared().collect::<Vec<_>>(), vec![EntityName::User]);
    }

    #[test]
    fn delete_after_upsert_removes_pending_write() {
        let mut changes = ChangeSet::default();
        changes.upsert((EntityName::Clue, 9), json!({"id": 9}));
        changes.delete((EntityName::Clue, 9));

        let mut snapshot = Snapshot::new();
        changes.apply(&mut snapshot);
        assert!(snapshot.is_empty());
        assert_eq!(changes.upserts().count(), 0);
    }

    #[test]
    fn max_row_id_scans_every_entity() {
        let mut snapshot = snapshot_with(EntityName::Game, &[(12, json!({}))]);
        snapshot.insert(EntityName::User, [(40, json!({}))].into_iter().collect());
        assert_eq!(max_row_id(&snapshot), 40);
        assert_eq!(max_row_id(&Snapshot::new()), 0);
    }
}
