use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic connection/thread id allocator, the value `SHOW PROCESSLIST`
/// and `KILL <id>` address a session by.
#[derive(Debug, Default)]
pub struct ThreadIdAllocator {
    next: AtomicU32,
}

impl ThreadIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn allocate(&self) -> u32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocates_strictly_increasing_ids() {
        let allocator = ThreadIdAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert!(b > a);
    }
}
