use std::path::Path;

use common::err::CResult;
use common::row::{Row, TableInfo};

/// A concrete on-disk encoding a `FileDataSource` hydrates from and writes
/// back to. Each format owns schema inference (used when no sidecar is
/// present) and the read/write pair; the data-source wrapper owns the MVCC
/// table, the sidecar, and the atomic write-back dance.
pub trait FileFormat: Send + Sync {
    /// Table name an adapter for this format hydrates into when the caller
    /// doesn't override it, e.g. `csv_data`.
    fn default_table_name(&self) -> &'static str;

    /// Best-effort schema inference from the file's own shape (CSV header,
    /// first JSON object's keys, ...). Used only when no sidecar schema is
    /// present.
    fn infer_schema(&self, path: &Path, table_name: &str) -> CResult<TableInfo>;

    fn read_rows(&self, path: &Path, info: &TableInfo) -> CResult<Vec<Row>>;

    fn write_rows(&self, path: &Path, info: &TableInfo, rows: &[Row]) -> CResult<()>;
}
