pub mod batch;
pub mod index_manager;
pub mod pool;

pub use batch::BatchExecutor;
pub use index_manager::{IndexDef, IndexManager, IndexStats};
pub use pool::{Conn, ConnectionPool, PoolConfig, PoolMetricsSnapshot};
