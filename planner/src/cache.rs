use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use common::row::Row;
use lru::LruCache;

/// A cached result set: the column names, the materialized rows, and the
/// total row count (independent of any `LIMIT` applied when it was run).
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub total: u64,
}

struct Entry {
    result: QueryResult,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl: Duration,
    pub total_access: u64,
    pub hit_count: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_access == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.total_access as f64
        }
    }
}

/// TTL+size-bounded LRU mapping SQL text to its last result. A write to a
/// table invalidates every entry whose SQL text contains the table name —
/// a conservative, best-effort substring test rather than real statement
/// parsing, so a query mentioning a table name in a string literal gets
/// invalidated unnecessarily but no real invalidation is ever missed.
pub struct QueryCache {
    inner: RwLock<LruCache<String, Entry>>,
    ttl: Duration,
    max_size: usize,
    total_access: RwLock<u64>,
    hit_count: RwLock<u64>,
}

impl QueryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: RwLock::new(LruCache::new(cap)),
            ttl,
            max_size,
            total_access: RwLock::new(0),
            hit_count: RwLock::new(0),
        }
    }

    /// Looks up `sql` verbatim. A hit past its TTL counts as a miss and is
    /// evicted immediately rather than left to the LRU to age out.
    pub fn get(&self, sql: &str) -> Option<QueryResult> {
        *self.total_access.write().unwrap() += 1;
        let mut cache = self.inner.write().unwrap();
        let Some(entry) = cache.get(sql) else {
            return None;
        };
        if entry.inserted_at.elapsed() > self.ttl {
            cache.pop(sql);
            return None;
        }
        let result = entry.result.clone();
        *self.hit_count.write().unwrap() += 1;
        Some(result)
    }

    pub fn put(&self, sql: impl Into<String>, result: QueryResult) {
        let mut cache = self.inner.write().unwrap();
        cache.put(
            sql.into(),
            Entry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops every cached entry whose SQL text mentions `table`.
    pub fn invalidate_table(&self, table: &str) {
        let mut cache = self.inner.write().unwrap();
        let stale: Vec<String> = cache
            .iter()
            .filter(|(sql, _)| sql.contains(table))
            .map(|(sql, _)| sql.clone())
            .collect();
        for sql in stale {
            cache.pop(&sql);
        }
    }

    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.inner.read().unwrap().len(),
            max_size: self.max_size,
            ttl: self.ttl,
            total_access: *self.total_access.read().unwrap(),
            hit_count: *self.hit_count.read().unwrap(),
        }
    }
}
