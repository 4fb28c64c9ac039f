use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::err::CResult;

use crate::wal::{replay, WalOp, WalWriter};

/// A read-only view into the engine's key space, handed to the closure
/// passed to `KvEngine::view`.
pub struct KvView<'a> {
    data: &'a BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a> KvView<'a> {
    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.data.get(key)
    }

    pub fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A read-write view handed to the closure passed to `KvEngine::update`.
/// Mutations are buffered and only applied (to the in-memory map and the
/// WAL) if the closure returns `Ok`.
pub struct KvTxn<'a> {
    base: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    pending: Vec<WalOp>,
}

impl<'a> KvTxn<'a> {
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        for op in self.pending.iter().rev() {
            match op {
                WalOp::Set { key: k, value } if k == key => return Some(value.clone()),
                WalOp::Delete { key: k } if k == key => return None,
                _ => {}
            }
        }
        self.base.get(key).cloned()
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.pending.push(WalOp::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.pending.push(WalOp::Delete { key: key.into() });
    }
}

struct EngineState {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    wal: WalWriter,
}

/// An in-process byte-addressable KV engine: a `BTreeMap` for reads, backed
/// by an append-only write-ahead log for durability across process
/// restarts. Shaped after a `sled`-style `open/view/update` API so the
/// adapter above it treats the concrete engine as swappable.
pub struct KvEngine {
    state: Mutex<EngineState>,
    #[allow(dead_code)]
    path: PathBuf,
}

impl KvEngine {
    /// Opens (creating if absent) the WAL file at `path` and replays it to
    /// reconstruct the in-memory map.
    pub fn open(path: impl AsRef<Path>) -> CResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut data = BTreeMap::new();
        for op in replay(&path)? {
            match op {
                WalOp::Set { key, value } => {
                    data.insert(key, value);
                }
                WalOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        let wal = WalWriter::open(&path)?;
        Ok(Self {
            state: Mutex::new(EngineState { data, wal }),
            path,
        })
    }

    pub fn view<R>(&self, f: impl FnOnce(&KvView) -> R) -> R {
        let state = self.state.lock().unwrap();
        f(&KvView { data: &state.data })
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut KvTxn) -> CResult<R>) -> CResult<R> {
        let mut state = self.state.lock().unwrap();
        let mut txn = KvTxn {
            base: &state.data,
            pending: Vec::new(),
        };
        let result = f(&mut txn)?;
        let pending = txn.pending;
        for op in &pending {
            state.wal.append(op)?;
        }
        for op in pending {
            match op {
                WalOp::Set { key, value } => {
                    state.data.insert(key, value);
                }
                WalOp::Delete { key } => {
                    state.data.remove(&key);
                }
            }
        }
        Ok(result)
    }

    pub fn get(&self, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        Ok(self.view(|v| v.get(key).cloned()))
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> CResult<()> {
        self.update(|txn| {
            txn.set(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    pub fn delete(&self, key: &[u8]) -> CResult<()> {
        self.update(|txn| {
            txn.delete(key.to_vec());
            Ok(())
        })
    }

    pub fn iter_prefix(&self, prefix: &[u8]) -> CResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self.view(|v| v.iter_prefix(prefix)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let engine = KvEngine::open(dir.path().join("db.wal")).unwrap();
        engine.set(b"k", b"v").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn reopen_replays_wal_and_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.wal");
        {
            let engine = KvEngine::open(&path).unwrap();
            engine.set(b"k", b"v1").unwrap();
            engine.set(b"k2", b"v2").unwrap();
            engine.delete(b"k2").unwrap();
        }
        let engine = KvEngine::open(&path).unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(engine.get(b"k2").unwrap(), None);
    }

    #[test]
    fn update_closure_sees_its_own_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = KvEngine::open(dir.path().join("db.wal")).unwrap();
        engine
            .update(|txn| {
                txn.set(b"a".to_vec(), b"1".to_vec());
                assert_eq!(txn.get(b"a"), Some(b"1".to_vec()));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn iter_prefix_returns_only_matching_keys() {
        let dir = tempfile::tempdir().unwrap();
        let engine = KvEngine::open(dir.path().join("db.wal")).unwrap();
        engine.set(b"users:1", b"a").unwrap();
        engine.set(b"users:2", b"b").unwrap();
        engine.set(b"orders:1", b"c").unwrap();
        let matches = engine.iter_prefix(b"users:").unwrap();
        assert_eq!(matches.len(), 2);
    }
}
