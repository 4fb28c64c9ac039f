use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

/// Lifecycle state of a running query, as reported by `SHOW PROCESSLIST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Running,
    Canceled,
    Timeout,
    Done,
}

/// One in-flight (or just-finished) query, keyed by a process-wide query id.
/// Cloning shares the same cancellation flag, so a `KILL` issued against one
/// clone is observed by every other holder.
#[derive(Debug, Clone)]
pub struct QueryContext {
    query_id: u64,
    thread_id: u32,
    sql: String,
    started_at: NaiveDateTime,
    canceled: Arc<AtomicBool>,
    status: Arc<std::sync::RwLock<QueryStatus>>,
}

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

impl QueryContext {
    pub fn new(thread_id: u32, sql: impl Into<String>) -> Self {
        Self {
            query_id: NEXT_QUERY_ID.fetch_add(1, Ordering::SeqCst),
            thread_id,
            sql: sql.into(),
            started_at: Utc::now().naive_utc(),
            canceled: Arc::new(AtomicBool::new(false)),
            status: Arc::new(std::sync::RwLock::new(QueryStatus::Running)),
        }
    }

    pub fn query_id(&self) -> u64 {
        self.query_id
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        *self.status.write().unwrap() = QueryStatus::Canceled;
    }

    pub fn mark_timeout(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        *self.status.write().unwrap() = QueryStatus::Timeout;
    }

    pub fn mark_done(&self) {
        *self.status.write().unwrap() = QueryStatus::Done;
    }

    pub fn status(&self) -> QueryStatus {
        *self.status.read().unwrap()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cancel_flips_status_and_is_observed_through_clone() {
        let ctx = QueryContext::new(1, "SELECT 1");
        let clone = ctx.clone();
        assert_eq!(ctx.status(), QueryStatus::Running);
        clone.cancel();
        assert!(ctx.is_canceled());
        assert_eq!(ctx.status(), QueryStatus::Canceled);
    }

    #[test]
    fn query_ids_are_unique_across_instances() {
        let a = QueryContext::new(1, "SELECT 1");
        let b = QueryContext::new(1, "SELECT 2");
        assert_ne!(a.query_id(), b.query_id());
    }
}
