use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use common::err::{CResult, ReError};
use common::row::{Row, TableInfo, Value};

use crate::autoincrement::Sequence;
use crate::txn::{TxnId, TxnManager, UNDELETED};
use crate::version::{RowId, RowVersion, VersionedRow};

const PK_KEY_SEP: char = '\u{1f}';

/// Stand-in snapshot for "whatever is currently live", used by internal
/// bookkeeping (uniqueness checks, index backfill) that isn't itself a read
/// under a caller-supplied snapshot.
const LATEST: TxnId = u64::MAX;

fn canonical_key(values: &[&Value]) -> String {
    values
        .iter()
        .map(|v| v.to_text())
        .collect::<Vec<_>>()
        .join(&PK_KEY_SEP.to_string())
}

struct TableState {
    info: TableInfo,
    next_row_id: RowId,
    rows: HashMap<RowId, VersionedRow>,
    pk_index: HashMap<String, RowId>,
    secondary_indexes: HashMap<String, HashMap<String, HashSet<RowId>>>,
    sequences: HashMap<String, Sequence>,
}

impl TableState {
    fn new(info: TableInfo) -> Self {
        let mut sequences = HashMap::new();
        for col in &info.columns {
            if col.auto_increment {
                sequences.insert(col.name.clone(), Sequence::new());
            }
        }
        Self {
            info,
            next_row_id: 1,
            rows: HashMap::new(),
            pk_index: HashMap::new(),
            secondary_indexes: HashMap::new(),
            sequences,
        }
    }

    fn pk_columns(&self) -> Vec<&str> {
        self.info
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    fn pk_key_of(&self, row: &Row) -> Option<String> {
        let cols = self.pk_columns();
        if cols.is_empty() {
            return None;
        }
        let values: Vec<&Value> = cols
            .iter()
            .map(|c| row.get(c).unwrap_or(&Value::Null))
            .collect();
        Some(canonical_key(&values))
    }

    fn index_value_key(row: &Row, column: &str) -> String {
        row.get(column).map(|v| v.to_text()).unwrap_or_default()
    }

    fn index_insert(&mut self, row: &Row, row_id: RowId) {
        for (column, bucket) in self.secondary_indexes.iter_mut() {
            let key = Self::index_value_key(row, column);
            bucket.entry(key).or_default().insert(row_id);
        }
    }

    fn index_remove(&mut self, row: &Row, row_id: RowId) {
        for (column, bucket) in self.secondary_indexes.iter_mut() {
            let key = Self::index_value_key(row, column);
            if let Some(set) = bucket.get_mut(&key) {
                set.remove(&row_id);
            }
        }
    }
}

/// A single table's version store. Concurrency: a read-write lock guards
/// the whole table state; readers hold it only long enough to snapshot the
/// version pointers they need before releasing it, writers hold it for the
/// whole version-chain + index mutation.
pub struct MvccTable {
    state: RwLock<TableState>,
}

impl MvccTable {
    pub fn new(info: TableInfo) -> Self {
        Self {
            state: RwLock::new(TableState::new(info)),
        }
    }

    pub fn info(&self) -> TableInfo {
        self.state.read().unwrap().info.clone()
    }

    pub fn create_index(&self, column: &str) -> CResult<()> {
        let mut state = self.state.write().unwrap();
        if state.info.column(column).is_none() {
            return Err(ReError::ColumnNotFound(column.to_string()));
        }
        let at = LATEST;
        let mut bucket: HashMap<String, HashSet<RowId>> = HashMap::new();
        for (row_id, versioned) in state.rows.iter() {
            if let Some(v) = versioned.visible(at) {
                let key = TableState::index_value_key(&v.payload, column);
                bucket.entry(key).or_default().insert(*row_id);
            }
        }
        state.secondary_indexes.insert(column.to_string(), bucket);
        Ok(())
    }

    pub fn has_index(&self, column: &str) -> bool {
        self.state.read().unwrap().secondary_indexes.contains_key(column)
    }

    /// Assigns auto-increment values for any column that has one and the
    /// row didn't supply explicitly (or supplied null), then advances the
    /// sequence's high-water mark if an explicit value was given.
    fn apply_auto_increment(state: &mut TableState, row: &mut Row) {
        let auto_inc_columns: Vec<String> = state.sequences.keys().cloned().collect();
        for column in auto_inc_columns {
            match row.get(&column) {
                None | Some(Value::Null) => {
                    let next = state.sequences[&column].next();
                    row.set(column, Value::Int(next));
                }
                Some(Value::Int(v)) => {
                    let v = *v;
                    state.sequences[&column].observe(v);
                }
                _ => {}
            }
        }
    }

    pub fn insert(&self, txn: &TxnManager, mut row: Row) -> CResult<RowId> {
        let mut state = self.state.write().unwrap();
        Self::apply_auto_increment(&mut state, &mut row);
        let pk_key = state.pk_key_of(&row);
        if let Some(ref key) = pk_key {
            if let Some(existing_id) = state.pk_index.get(key).copied() {
                let at = LATEST;
                let still_visible = state
                    .rows
                    .get(&existing_id)
                    .and_then(|v| v.visible(at))
                    .is_some();
                if still_visible {
                    return Err(ReError::DuplicateKey(key.clone()));
                }
            }
        }
        for col in state.info.columns.iter().filter(|c| c.unique && !c.primary_key) {
            let column = col.name.clone();
            if state.secondary_indexes.contains_key(&column) {
                let key = TableState::index_value_key(&row, &column);
                let at = LATEST;
                let conflict = state
                    .secondary_indexes
                    .get(&column)
                    .and_then(|b| b.get(&key))
                    .map(|ids| {
                        ids.iter()
                            .any(|id| state.rows.get(id).and_then(|v| v.visible(at)).is_some())
                    })
                    .unwrap_or(false);
                if conflict {
                    return Err(ReError::DuplicateKey(format!("{column}={key}")));
                }
            }
        }

        let commit = txn.begin_commit();
        let row_id = state.next_row_id;
        state.next_row_id += 1;
        let mut versioned = VersionedRow::default();
        versioned.push(RowVersion {
            created: commit,
            deleted: UNDELETED,
            payload: row.clone(),
        });
        state.rows.insert(row_id, versioned);
        if let Some(key) = pk_key {
            state.pk_index.insert(key, row_id);
        }
        state.index_insert(&row, row_id);
        Ok(row_id)
    }

    /// Rewrites `row_id` in place: marks the currently-live version deleted
    /// and appends a new version, both stamped with the same commit txn.
    pub fn update_row(&self, txn: &TxnManager, row_id: RowId, new_row: Row) -> CResult<()> {
        let mut state = self.state.write().unwrap();
        let old_row = {
            let versioned = state
                .rows
                .get(&row_id)
                .ok_or_else(|| ReError::Bug(format!("update on missing row_id {row_id}")))?;
            versioned
                .visible(LATEST)
                .map(|v| v.payload.clone())
                .ok_or_else(|| ReError::Bug(format!("update on invisible row_id {row_id}")))?
        };
        let commit = txn.begin_commit();
        {
            let versioned = state.rows.get_mut(&row_id).unwrap();
            versioned.mark_deleted(commit);
            versioned.push(RowVersion {
                created: commit,
                deleted: UNDELETED,
                payload: new_row.clone(),
            });
        }
        state.index_remove(&old_row, row_id);
        state.index_insert(&new_row, row_id);
        if let Some(old_key) = state.pk_key_of(&old_row) {
            state.pk_index.remove(&old_key);
        }
        if let Some(new_key) = state.pk_key_of(&new_row) {
            state.pk_index.insert(new_key, row_id);
        }
        Ok(())
    }

    pub fn delete_row(&self, txn: &TxnManager, row_id: RowId) -> CResult<()> {
        let mut state = self.state.write().unwrap();
        let old_row = {
            let versioned = state
                .rows
                .get(&row_id)
                .ok_or_else(|| ReError::Bug(format!("delete on missing row_id {row_id}")))?;
            versioned
                .visible(LATEST)
                .map(|v| v.payload.clone())
                .ok_or_else(|| ReError::Bug(format!("delete on invisible row_id {row_id}")))?
        };
        let commit = txn.begin_commit();
        state.rows.get_mut(&row_id).unwrap().mark_deleted(commit);
        state.index_remove(&old_row, row_id);
        if let Some(key) = state.pk_key_of(&old_row) {
            state.pk_index.remove(&key);
        }
        Ok(())
    }

    /// Snapshots visible `(row_id, row)` pairs at `at`, copying payloads out
    /// before releasing the read lock.
    pub fn scan(&self, at: TxnId) -> Vec<(RowId, Row)> {
        let state = self.state.read().unwrap();
        state
            .rows
            .iter()
            .filter_map(|(id, v)| v.visible(at).map(|ver| (*id, ver.payload.clone())))
            .collect()
    }

    pub fn get_by_pk(&self, at: TxnId, pk_values: &[&Value]) -> Option<Row> {
        let state = self.state.read().unwrap();
        let key = canonical_key(pk_values);
        let row_id = *state.pk_index.get(&key)?;
        state.rows.get(&row_id)?.visible(at).map(|v| v.payload.clone())
    }

    /// Feeds rows in directly without per-row index maintenance, then
    /// rebuilds indexes once at the end. Used by file-format adapters at
    /// connect time, where per-row overhead would dominate.
    pub fn bulk_load(&self, txn: &TxnManager, rows: Vec<Row>) -> CResult<usize> {
        let mut state = self.state.write().unwrap();
        let commit = txn.begin_commit();
        let mut count = 0;
        for mut row in rows {
            Self::apply_auto_increment(&mut state, &mut row);
            let row_id = state.next_row_id;
            state.next_row_id += 1;
            let mut versioned = VersionedRow::default();
            versioned.push(RowVersion {
                created: commit,
                deleted: UNDELETED,
                payload: row.clone(),
            });
            state.rows.insert(row_id, versioned);
            if let Some(key) = state.pk_key_of(&row) {
                state.pk_index.insert(key, row_id);
            }
            count += 1;
        }
        let indexed_columns: Vec<String> = state.secondary_indexes.keys().cloned().collect();
        for column in indexed_columns {
            let mut bucket = HashMap::new();
            for (row_id, versioned) in state.rows.iter() {
                if let Some(v) = versioned.visible(LATEST) {
                    let key = TableState::index_value_key(&v.payload, &column);
                    bucket.entry(key).or_insert_with(HashSet::new).insert(*row_id);
                }
            }
            state.secondary_indexes.insert(column, bucket);
        }
        Ok(count)
    }

    /// Drops all rows. Sequences reset unless `retain_sequences` is set.
    pub fn truncate(&self, retain_sequences: bool) {
        let mut state = self.state.write().unwrap();
        state.rows.clear();
        state.pk_index.clear();
        for bucket in state.secondary_indexes.values_mut() {
            bucket.clear();
        }
        if !retain_sequences {
            for seq in state.sequences.values() {
                seq.reset();
            }
        }
    }
}
