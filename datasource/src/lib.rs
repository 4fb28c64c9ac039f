pub mod config;
pub mod contract;
pub mod factory;
pub mod filter;
pub mod filter_eval;
pub mod manager;

pub use config::{BackendType, DataSourceConfig};
pub use contract::{DataSource, ExecResult, FilterableDataSource, Transaction, TransactionalDataSource};
pub use factory::{DataSourceFactory, EngineMetadata, FactoryRegistry};
pub use filter::{FilterExpr, FilterOp, LogicOp};
pub use filter_eval::eval as eval_filter;
pub use manager::DataSourceManager;
