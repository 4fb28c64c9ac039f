use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use common::err::{CResult, ReError};
use common::row::Row;
use datasource::contract::Transaction;
use datasource::filter::FilterExpr;
use datasource::filter_eval;

use crate::engine::MvccEngine;
use crate::version::RowId;

/// A transaction/snapshot id. Reads take one as a read snapshot; commits
/// allocate one to stamp newly created/deleted versions.
pub type TxnId = u64;

/// Process-wide monotonic counter backing both read snapshots and commit
/// ids. A single counter (rather than separate read/write sequences) keeps
/// "is this version visible" a plain integer comparison.
#[derive(Debug, Default)]
pub struct TxnManager {
    counter: AtomicU64,
}

impl TxnManager {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Takes a read snapshot: the highest txn id committed so far.
    pub fn read_snapshot(&self) -> TxnId {
        self.counter.load(Ordering::SeqCst)
    }

    /// Allocates a new commit txn id, advancing the counter.
    pub fn begin_commit(&self) -> TxnId {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Sentinel meaning "not yet deleted".
pub const UNDELETED: TxnId = u64::MAX;

const NO_SESSION_SCOPE: u32 = 0;

/// How to undo one write applied during a transaction, captured before the
/// write took effect so `rollback` can play them back in reverse. Every op
/// commits to the engine immediately (so a transaction sees its own
/// writes, same as a read straight through `MvccDataSource`); `rollback`
/// compensates rather than replaying from a buffer.
enum UndoOp {
    /// Undo an insert by deleting the row it created.
    Delete { table: String, row_id: RowId },
    /// Undo an update by writing the pre-update payload back.
    Restore { table: String, row_id: RowId, old_row: Row },
    /// Undo a delete by re-inserting the row it removed. Gets a fresh row
    /// id; callers never observe row ids through the `DataSource` surface
    /// so this is indistinguishable from the original row reappearing.
    Reinsert { table: String, old_row: Row },
}

/// A transaction handle over `MvccEngine`: every `query`/`insert`/
/// `update`/`delete` call takes effect immediately against the shared
/// engine, with an undo log recorded alongside so `rollback` can restore
/// the pre-transaction state. `commit` just discards the log.
pub struct MvccTransaction {
    engine: Arc<MvccEngine>,
    writable: bool,
    undo: Mutex<Vec<UndoOp>>,
}

impl MvccTransaction {
    pub fn new(engine: Arc<MvccEngine>, writable: bool) -> Self {
        Self {
            engine,
            writable,
            undo: Mutex::new(Vec::new()),
        }
    }

    fn require_writable(&self, what: &str) -> CResult<()> {
        if !self.writable {
            return Err(ReError::ReadOnly(what.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transaction for MvccTransaction {
    async fn query(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<Vec<Row>> {
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let rows = handle.scan(snapshot).into_iter().map(|(_, row)| row);
        Ok(match filter {
            Some(expr) => rows.filter(|row| filter_eval::eval(expr, row)).collect(),
            None => rows.collect(),
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> CResult<u64> {
        self.require_writable(&format!("insert into {table}"))?;
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let mut undo = self.undo.lock().unwrap();
        let mut count = 0u64;
        for row in rows {
            let row_id = handle.insert(&self.engine.txn, row)?;
            undo.push(UndoOp::Delete {
                table: table.to_string(),
                row_id,
            });
            count += 1;
        }
        Ok(count)
    }

    async fn update(&self, table: &str, filter: Option<&FilterExpr>, changes: Row) -> CResult<u64> {
        self.require_writable(&format!("update {table}"))?;
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let mut undo = self.undo.lock().unwrap();
        let mut count = 0u64;
        for (row_id, row) in handle.scan(snapshot) {
            if !filter.map_or(true, |expr| filter_eval::eval(expr, &row)) {
                continue;
            }
            let mut merged = row.clone();
            for (name, value) in changes.iter() {
                merged.set(name, value.clone());
            }
            handle.update_row(&self.engine.txn, row_id, merged)?;
            undo.push(UndoOp::Restore {
                table: table.to_string(),
                row_id,
                old_row: row,
            });
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<u64> {
        self.require_writable(&format!("delete from {table}"))?;
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let mut undo = self.undo.lock().unwrap();
        let mut count = 0u64;
        for (row_id, row) in handle.scan(snapshot) {
            if !filter.map_or(true, |expr| filter_eval::eval(expr, &row)) {
                continue;
            }
            handle.delete_row(&self.engine.txn, row_id)?;
            undo.push(UndoOp::Reinsert {
                table: table.to_string(),
                old_row: row,
            });
            count += 1;
        }
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> CResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CResult<()> {
        let mut undo = self.undo.into_inner().unwrap();
        while let Some(op) = undo.pop() {
            match op {
                UndoOp::Delete { table, row_id } => {
                    let handle = self.engine.resolve(NO_SESSION_SCOPE, &table)?;
                    handle.delete_row(&self.engine.txn, row_id)?;
                }
                UndoOp::Restore { table, row_id, old_row } => {
                    let handle = self.engine.resolve(NO_SESSION_SCOPE, &table)?;
                    handle.update_row(&self.engine.txn, row_id, old_row)?;
                }
                UndoOp::Reinsert { table, old_row } => {
                    let handle = self.engine.resolve(NO_SESSION_SCOPE, &table)?;
                    handle.insert(&self.engine.txn, old_row)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn commit_ids_are_strictly_increasing_and_visible_to_later_snapshots() {
        let mgr = TxnManager::new();
        let s0 = mgr.read_snapshot();
        let w1 = mgr.begin_commit();
        assert!(w1 > s0);
        let s1 = mgr.read_snapshot();
        assert!(s1 >= w1);
    }

    fn users_engine() -> Arc<MvccEngine> {
        use common::row::ColumnInfo;
        use common::row::TableInfo;
        let engine = MvccEngine::new();
        engine
            .create_table(TableInfo::new(
                "users",
                vec![
                    ColumnInfo::new("id", "bigint").primary_key().auto_increment(),
                    ColumnInfo::new("name", "varchar"),
                ],
            ))
            .unwrap();
        Arc::new(engine)
    }

    #[tokio::test]
    async fn committed_insert_stays_visible() {
        use common::row::Value;
        let txn = MvccTransaction::new(users_engine(), true);
        let mut row = Row::new();
        row.set("name", Value::String("ada".into()));
        txn.insert("users", vec![row]).await.unwrap();
        let rows = Box::new(txn).commit().await;
        assert!(rows.is_ok());
    }

    #[tokio::test]
    async fn rollback_undoes_an_insert() {
        use common::row::Value;
        let engine = users_engine();
        let txn = MvccTransaction::new(engine.clone(), true);
        let mut row = Row::new();
        row.set("name", Value::String("ada".into()));
        txn.insert("users", vec![row]).await.unwrap();
        assert_eq!(txn.query("users", None).await.unwrap().len(), 1);
        Box::new(txn).rollback().await.unwrap();

        let table = engine.resolve(NO_SESSION_SCOPE, "users").unwrap();
        assert!(table.scan(engine.txn.read_snapshot()).is_empty());
    }

    #[tokio::test]
    async fn rollback_restores_a_deleted_row() {
        use common::row::Value;
        let engine = users_engine();
        let table = engine.resolve(NO_SESSION_SCOPE, "users").unwrap();
        let mut row = Row::new();
        row.set("name", Value::String("ada".into()));
        table.insert(&engine.txn, row).unwrap();

        let txn = MvccTransaction::new(engine.clone(), true);
        let deleted = txn.delete("users", None).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(txn.query("users", None).await.unwrap().is_empty());
        Box::new(txn).rollback().await.unwrap();

        let rows = table.scan(engine.txn.read_snapshot());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.get("name"), Some(&Value::String("ada".into())));
    }

    #[tokio::test]
    async fn read_only_transaction_rejects_writes() {
        let engine = users_engine();
        let txn = MvccTransaction::new(engine, false);
        let err = txn.insert("users", vec![Row::new()]).await.unwrap_err();
        assert!(matches!(err, ReError::ReadOnly(_)));
    }
}
