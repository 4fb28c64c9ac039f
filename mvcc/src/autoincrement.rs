use std::sync::atomic::{AtomicI64, Ordering};

/// An auto-increment sequence for one column. `next()` returns the next
/// integer and persists the high-water mark so a later `next()` (even
/// after a crash-free restart within the same process) never repeats.
#[derive(Debug, Default)]
pub struct Sequence {
    high_water: AtomicI64,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            high_water: AtomicI64::new(0),
        }
    }

    pub fn next(&self) -> i64 {
        self.high_water.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Advances the high-water mark if `value` is larger, used when an
    /// explicit value is inserted into an auto-increment column.
    pub fn observe(&self, value: i64) {
        self.high_water.fetch_max(value, Ordering::SeqCst);
    }

    /// Resets to zero. `TRUNCATE` calls this unless the sequence is marked
    /// retained.
    pub fn reset(&self) {
        self.high_water.store(0, Ordering::SeqCst);
    }

    pub fn current(&self) -> i64 {
        self.high_water.load(Ordering::SeqCst)
    }
}
