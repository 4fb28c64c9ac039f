use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use common::err::{CResult, ReError};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_open: usize,
    pub max_idle: usize,
    pub conn_max_lifetime: Duration,
    pub idle_timeout: Duration,
}

/// A checked-out handle plus the bookkeeping needed to age it out later.
pub struct Conn<T> {
    pub handle: T,
    created_at: Instant,
}

struct IdleEntry<T> {
    conn: Conn<T>,
    last_used: Instant,
}

#[derive(Default)]
pub struct PoolMetricsSnapshot {
    pub created: u64,
    pub destroyed: u64,
    pub acquired: u64,
    pub released: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Metrics {
    created: AtomicU64,
    destroyed: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
    errors: AtomicU64,
}

impl Metrics {
    fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Generic pool over a handle type (a connection, a file descriptor, ...).
/// `get` reuses an idle entry that hasn't aged past `idle_timeout`/
/// `conn_max_lifetime`, destroying any it skips over; when none qualify and
/// the pool is already at `max_open`, it returns `ErrPoolExhausted` rather
/// than blocking.
pub struct ConnectionPool<T> {
    config: PoolConfig,
    idle: Mutex<Vec<IdleEntry<T>>>,
    open_count: AtomicUsize,
    factory: Box<dyn Fn() -> CResult<T> + Send + Sync>,
    metrics: Metrics,
}

impl<T> ConnectionPool<T> {
    pub fn new(config: PoolConfig, factory: impl Fn() -> CResult<T> + Send + Sync + 'static) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
            factory: Box::new(factory),
            metrics: Metrics::default(),
        }
    }

    pub fn get(&self) -> CResult<Conn<T>> {
        let now = Instant::now();
        {
            let mut idle = self.idle.lock().unwrap();
            while let Some(entry) = idle.pop() {
                let expired = now.duration_since(entry.last_used) > self.config.idle_timeout
                    || now.duration_since(entry.conn.created_at) > self.config.conn_max_lifetime;
                if expired {
                    self.open_count.fetch_sub(1, Ordering::Relaxed);
                    self.metrics.destroyed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                self.metrics.acquired.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.conn);
            }
        }

        if self.open_count.load(Ordering::Relaxed) >= self.config.max_open {
            self.metrics.errors.fetch_add(1, Ordering::Relaxed);
            return Err(ReError::PoolExhausted);
        }

        match (self.factory)() {
            Ok(handle) => {
                self.open_count.fetch_add(1, Ordering::Relaxed);
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                self.metrics.acquired.fetch_add(1, Ordering::Relaxed);
                Ok(Conn {
                    handle,
                    created_at: now,
                })
            }
            Err(e) => {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn release(&self, conn: Conn<T>) {
        let mut idle = self.idle.lock().unwrap();
        if idle.len() >= self.config.max_idle {
            drop(idle);
            self.open_count.fetch_sub(1, Ordering::Relaxed);
            self.metrics.destroyed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        idle.push(IdleEntry {
            conn,
            last_used: Instant::now(),
        });
        self.metrics.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn pool(config: PoolConfig) -> ConnectionPool<u32> {
        let counter = Arc::new(AtomicU32::new(0));
        ConnectionPool::new(config, move || Ok(counter.fetch_add(1, Ordering::SeqCst)))
    }

    #[test]
    fn get_creates_up_to_max_open_then_exhausts() {
        let pool = pool(PoolConfig {
            max_open: 1,
            max_idle: 1,
            conn_max_lifetime: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(60),
        });
        let _first = pool.get().unwrap();
        let err = pool.get().unwrap_err();
        assert!(matches!(err, ReError::PoolExhausted));
    }

    #[test]
    fn release_then_get_reuses_the_idle_entry() {
        let pool = pool(PoolConfig {
            max_open: 1,
            max_idle: 1,
            conn_max_lifetime: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(60),
        });
        let conn = pool.get().unwrap();
        let handle = conn.handle;
        pool.release(Conn {
            handle,
            created_at: Instant::now(),
        });
        let reused = pool.get().unwrap();
        assert_eq!(reused.handle, handle);
        assert_eq!(pool.metrics().created, 1);
    }

    #[test]
    fn expired_idle_entry_is_destroyed_not_reused() {
        let pool = pool(PoolConfig {
            max_open: 2,
            max_idle: 2,
            conn_max_lifetime: Duration::from_secs(60),
            idle_timeout: Duration::from_millis(0),
        });
        let conn = pool.get().unwrap();
        pool.release(conn);
        std::thread::sleep(Duration::from_millis(5));
        let fresh = pool.get().unwrap();
        assert_eq!(fresh.handle, 1);
        assert_eq!(pool.metrics().destroyed, 1);
    }
}
