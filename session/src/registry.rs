use std::sync::Arc;

use common::err::{CResult, ReError};
use dashmap::DashMap;

use crate::query_context::QueryContext;
use crate::session::Session;
use crate::thread_id::ThreadIdAllocator;

/// Process-wide table of live sessions, keyed by thread id. Backs
/// `SHOW PROCESSLIST` and connection-scoped lookups from the command loop.
#[derive(Default)]
pub struct SessionRegistry {
    allocator: ThreadIdAllocator,
    sessions: DashMap<u32, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            allocator: ThreadIdAllocator::new(),
            sessions: DashMap::new(),
        }
    }

    /// Allocates a thread id and registers a new session under it.
    pub fn create_session(&self, user: impl Into<String>, host: impl Into<String>) -> Arc<Session> {
        let thread_id = self.allocator.allocate();
        let session = Arc::new(Session::new(thread_id, user, host));
        self.sessions.insert(thread_id, session.clone());
        session
    }

    pub fn get(&self, thread_id: u32) -> Option<Arc<Session>> {
        self.sessions.get(&thread_id).map(|s| s.clone())
    }

    pub fn remove(&self, thread_id: u32) {
        self.sessions.remove(&thread_id);
    }

    pub fn list(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}

/// Process-wide table of in-flight queries, keyed by query id, with a
/// secondary thread-id index so `KILL <thread_id>` can cancel whatever
/// query that connection is currently running.
#[derive(Default)]
pub struct QueryRegistry {
    queries: DashMap<u64, QueryContext>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self {
            queries: DashMap::new(),
        }
    }

    pub fn register(&self, ctx: QueryContext) {
        self.queries.insert(ctx.query_id(), ctx);
    }

    pub fn unregister(&self, query_id: u64) {
        self.queries.remove(&query_id);
    }

    pub fn get(&self, query_id: u64) -> Option<QueryContext> {
        self.queries.get(&query_id).map(|q| q.clone())
    }

    /// Cancels every running query owned by `thread_id`. Errors if none is
    /// found, mirroring MySQL's `Unknown thread id` error for `KILL`.
    pub fn kill_by_thread_id(&self, thread_id: u32) -> CResult<()> {
        let mut found = false;
        for entry in self.queries.iter() {
            if entry.value().thread_id() == thread_id {
                entry.value().cancel();
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(ReError::UnknownThreadId(thread_id))
        }
    }

    pub fn list(&self) -> Vec<QueryContext> {
        self.queries.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_registry_allocates_distinct_thread_ids() {
        let registry = SessionRegistry::new();
        let a = registry.create_session("root", "localhost");
        let b = registry.create_session("root", "localhost");
        assert_ne!(a.thread_id(), b.thread_id());
        assert_eq!(registry.list().len(), 2);
        registry.remove(a.thread_id());
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn kill_by_thread_id_cancels_matching_queries_only() {
        let registry = QueryRegistry::new();
        let ctx_a = QueryContext::new(1, "SELECT 1");
        let ctx_b = QueryContext::new(2, "SELECT 2");
        registry.register(ctx_a.clone());
        registry.register(ctx_b.clone());
        registry.kill_by_thread_id(1).unwrap();
        assert!(ctx_a.is_canceled());
        assert!(!ctx_b.is_canceled());
    }

    #[test]
    fn kill_unknown_thread_id_errors() {
        let registry = QueryRegistry::new();
        let err = registry.kill_by_thread_id(999).unwrap_err();
        assert!(matches!(err, ReError::UnknownThreadId(999)));
    }
}
