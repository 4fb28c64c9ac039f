pub mod autoincrement;
pub mod datasource_impl;
pub mod engine;
pub mod factory;
pub mod table;
pub mod txn;
pub mod version;

pub use datasource_impl::MvccDataSource;
pub use engine::MvccEngine;
pub use factory::MvccFactory;
pub use table::MvccTable;
pub use txn::{MvccTransaction, TxnId, TxnManager};
pub use version::{RowId, RowVersion, VersionedRow};
