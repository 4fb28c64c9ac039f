use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use datasource::contract::Transaction;
use protocol::capability::CapabilityFlags;
use protocol::prepared::StatementTable;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::variables::VariableBag;

/// A single client connection's server-side state: identity, the database
/// it's `USE`-d into, its variable bag, its prepared-statement slots, which
/// named data source instance it's bound to, and the capability flags it
/// negotiated at handshake.
pub struct Session {
    thread_id: u32,
    user: RwLock<String>,
    host: String,
    current_database: RwLock<Option<String>>,
    variables: RwLock<VariableBag>,
    statements: RwLock<StatementTable>,
    bound_data_source: RwLock<Option<String>>,
    next_sequence: AtomicU64,
    client_capabilities: RwLock<CapabilityFlags>,
    transaction: AsyncMutex<Option<Box<dyn Transaction>>>,
}

impl Session {
    pub fn new(thread_id: u32, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            thread_id,
            user: RwLock::new(user.into()),
            host: host.into(),
            current_database: RwLock::new(None),
            variables: RwLock::new(VariableBag::default()),
            statements: RwLock::new(StatementTable::new()),
            bound_data_source: RwLock::new(None),
            next_sequence: AtomicU64::new(1),
            client_capabilities: RwLock::new(CapabilityFlags::empty()),
            transaction: AsyncMutex::new(None),
        }
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn user(&self) -> String {
        self.user.read().unwrap().clone()
    }

    /// Updates the authenticated identity once the handshake response has
    /// been verified. The thread id and host are fixed at connect time;
    /// only the username changes, from the placeholder assigned before
    /// authentication to the real account the client logged in as.
    pub fn set_user(&self, user: impl Into<String>) {
        *self.user.write().unwrap() = user.into();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn current_database(&self) -> Option<String> {
        self.current_database.read().unwrap().clone()
    }

    pub fn use_database(&self, name: impl Into<String>) {
        *self.current_database.write().unwrap() = Some(name.into());
    }

    pub fn clear_database(&self) {
        *self.current_database.write().unwrap() = None;
    }

    pub fn bound_data_source(&self) -> Option<String> {
        self.bound_data_source.read().unwrap().clone()
    }

    pub fn bind_data_source(&self, name: impl Into<String>) {
        *self.bound_data_source.write().unwrap() = Some(name.into());
    }

    pub fn set_variable(&self, raw_name: &str, value: common::row::Value) {
        self.variables.write().unwrap().set_variable(raw_name, value);
    }

    pub fn get_variable(&self, raw_name: &str) -> Option<common::row::Value> {
        self.variables.read().unwrap().get(raw_name).cloned()
    }

    pub fn get_all_variables(&self) -> std::collections::HashMap<String, common::row::Value> {
        self.variables.read().unwrap().get_all_variables()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Records the capability flags the client advertised in its handshake
    /// response. Called once, right after `HandshakeResponse41` is parsed.
    pub fn set_client_capabilities(&self, flags: CapabilityFlags) {
        *self.client_capabilities.write().unwrap() = flags;
    }

    pub fn client_capabilities(&self) -> CapabilityFlags {
        *self.client_capabilities.read().unwrap()
    }

    /// Whether the client negotiated `CLIENT_COMPRESS` at handshake.
    pub fn compression_enabled(&self) -> bool {
        self.client_capabilities().contains(CapabilityFlags::CLIENT_COMPRESS)
    }

    pub fn with_statements<R>(&self, f: impl FnOnce(&mut StatementTable) -> R) -> R {
        let mut statements = self.statements.write().unwrap();
        f(&mut statements)
    }

    /// Opens an explicit transaction against `txn`. Replaces any prior one
    /// without closing it — callers are expected to check `in_transaction`
    /// first so `BEGIN` inside an open transaction is handled explicitly
    /// rather than silently leaking the old handle.
    pub async fn begin_transaction(&self, txn: Box<dyn Transaction>) {
        *self.transaction.lock().await = Some(txn);
    }

    pub async fn in_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    /// Hands the open transaction to `f`, which is expected to commit or
    /// roll it back. Returns `None` (without calling `f`) when no
    /// transaction is open.
    pub async fn take_transaction(&self) -> Option<Box<dyn Transaction>> {
        self.transaction.lock().await.take()
    }

    /// Locks the transaction slot for the duration of one statement.
    /// DML/SELECT check `guard.as_deref()` and, if `Some`, route through
    /// the open transaction instead of the plain `DataSource`; the slot
    /// stays locked (and the transaction open) until the guard drops at
    /// the end of that one statement.
    pub async fn transaction_guard(&self) -> AsyncMutexGuard<'_, Option<Box<dyn Transaction>>> {
        self.transaction.lock().await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn use_database_is_visible_and_clearable() {
        let session = Session::new(1, "root", "localhost");
        assert_eq!(session.current_database(), None);
        session.use_database("test");
        assert_eq!(session.current_database(), Some("test".to_string()));
        session.clear_database();
        assert_eq!(session.current_database(), None);
    }

    #[test]
    fn prepared_statement_slots_round_trip() {
        let session = Session::new(1, "root", "localhost");
        let id = session.with_statements(|t| t.prepare("SELECT ?", vec![]));
        session.with_statements(|t| {
            assert_eq!(t.get(id).unwrap().param_count, 1);
        });
    }

    #[test]
    fn set_user_replaces_the_placeholder_identity() {
        let session = Session::new(1, "unauthenticated", "127.0.0.1");
        assert_eq!(session.user(), "unauthenticated");
        session.set_user("root");
        assert_eq!(session.user(), "root");
    }

    #[test]
    fn sequence_counter_is_strictly_increasing() {
        let session = Session::new(1, "root", "localhost");
        let a = session.next_sequence();
        let b = session.next_sequence();
        assert!(b > a);
    }

    #[test]
    fn compression_is_disabled_until_the_client_advertises_it() {
        let session = Session::new(1, "root", "localhost");
        assert!(!session.compression_enabled());
        session.set_client_capabilities(CapabilityFlags::CLIENT_COMPRESS | CapabilityFlags::CLIENT_PROTOCOL_41);
        assert!(session.compression_enabled());
    }

    struct NoopTransaction;

    #[async_trait::async_trait]
    impl Transaction for NoopTransaction {
        async fn query(&self, _table: &str, _filter: Option<&datasource::filter::FilterExpr>) -> common::err::CResult<Vec<common::row::Row>> {
            Ok(vec![])
        }
        async fn insert(&self, _table: &str, rows: Vec<common::row::Row>) -> common::err::CResult<u64> {
            Ok(rows.len() as u64)
        }
        async fn update(
            &self,
            _table: &str,
            _filter: Option<&datasource::filter::FilterExpr>,
            _changes: common::row::Row,
        ) -> common::err::CResult<u64> {
            Ok(0)
        }
        async fn delete(&self, _table: &str, _filter: Option<&datasource::filter::FilterExpr>) -> common::err::CResult<u64> {
            Ok(0)
        }
        async fn commit(self: Box<Self>) -> common::err::CResult<()> {
            Ok(())
        }
        async fn rollback(self: Box<Self>) -> common::err::CResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn begin_transaction_is_visible_until_taken() {
        let session = Session::new(1, "root", "localhost");
        assert!(!session.in_transaction().await);
        session.begin_transaction(Box::new(NoopTransaction)).await;
        assert!(session.in_transaction().await);
        let txn = session.take_transaction().await;
        assert!(txn.is_some());
        assert!(!session.in_transaction().await);
    }
}
