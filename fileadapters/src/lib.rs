pub mod csv_format;
pub mod datasource_impl;
pub mod factory;
pub mod format;
pub mod json_format;
pub mod jsonl_format;
pub mod parquet_format;
pub mod sidecar;

pub use csv_format::CsvFormat;
pub use datasource_impl::FileDataSource;
pub use factory::{CsvFactory, JsonFactory, JsonlFactory, ParquetFactory};
pub use format::FileFormat;
pub use json_format::JsonFormat;
pub use jsonl_format::JsonlFormat;
pub use parquet_format::ParquetFormat;
