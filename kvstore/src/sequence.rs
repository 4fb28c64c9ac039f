use byteorder::{ByteOrder, LittleEndian};
use common::err::CResult;

use crate::engine::KvEngine;

const SEQUENCE_PREFIX: &str = "\u{0}seq\u{0}";

fn sequence_key(name: &str) -> Vec<u8> {
    format!("{SEQUENCE_PREFIX}{name}").into_bytes()
}

/// A persisted auto-increment counter backed by a reserved key in the same
/// engine that stores rows, so a sequence's high-water mark survives a
/// restart exactly like any other write.
pub struct SequenceManager<'a> {
    engine: &'a KvEngine,
}

impl<'a> SequenceManager<'a> {
    pub fn new(engine: &'a KvEngine) -> Self {
        Self { engine }
    }

    pub fn next(&self, name: &str) -> CResult<i64> {
        let key = sequence_key(name);
        self.engine.update(|txn| {
            let current = txn
                .get(&key)
                .map(|bytes| LittleEndian::read_i64(&bytes))
                .unwrap_or(0);
            let next = current + 1;
            let mut buf = [0u8; 8];
            LittleEndian::write_i64(&mut buf, next);
            txn.set(key.clone(), buf.to_vec());
            Ok(next)
        })
    }

    pub fn current(&self, name: &str) -> CResult<i64> {
        let key = sequence_key(name);
        Ok(self
            .engine
            .get(&key)?
            .map(|bytes| LittleEndian::read_i64(&bytes))
            .unwrap_or(0))
    }

    pub fn reset(&self, name: &str) -> CResult<()> {
        self.engine.delete(&sequence_key(name))
    }
}
