pub mod codec;
pub mod datasource_impl;
pub mod engine;
pub mod factory;
pub mod sequence;
pub mod wal;

pub use datasource_impl::KvDataSource;
pub use engine::{KvEngine, KvTxn, KvView};
pub use factory::KvFactory;
pub use sequence::SequenceManager;
pub use wal::{WalOp, WalWriter};
