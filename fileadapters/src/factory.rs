use common::err::CResult;
use datasource::{BackendType, DataSource, DataSourceConfig, DataSourceFactory, EngineMetadata};

use crate::csv_format::CsvFormat;
use crate::datasource_impl::FileDataSource;
use crate::json_format::JsonFormat;
use crate::jsonl_format::JsonlFormat;
use crate::parquet_format::ParquetFormat;

macro_rules! file_format_factory {
    ($factory:ident, $format:ty, $tag:literal, $comment:literal) => {
        pub struct $factory;

        impl DataSourceFactory for $factory {
            fn get_type(&self) -> BackendType {
                BackendType::new($tag)
            }

            fn get_metadata(&self) -> EngineMetadata {
                EngineMetadata {
                    comment: $comment.into(),
                    supports_transactions: false,
                    supports_xa: false,
                    supports_savepoints: false,
                }
            }

            fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>> {
                Ok(Box::new(FileDataSource::new(config, $format)))
            }
        }
    };
}

file_format_factory!(CsvFactory, CsvFormat, "csv", "file-backed adapter hydrating CSV into an MVCC table");
file_format_factory!(JsonFactory, JsonFormat, "json", "file-backed adapter hydrating a JSON array into an MVCC table");
file_format_factory!(JsonlFactory, JsonlFormat, "jsonl", "file-backed adapter hydrating newline-delimited JSON into an MVCC table");
file_format_factory!(ParquetFactory, ParquetFormat, "parquet", "file-backed adapter hydrating a Parquet file into an MVCC table");
