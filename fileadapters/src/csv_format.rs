use std::path::Path;

use common::err::{CResult, ReError};
use common::row::{ColumnInfo, Row, TableInfo, Value};

use crate::format::FileFormat;

/// CSV files: first row is the header, every other row is string-typed
/// data. Schema inference has no way to recover richer column types than
/// `varchar`, so a sidecar is the only way to get typed columns or a
/// primary key out of a CSV-backed table.
pub struct CsvFormat;

impl FileFormat for CsvFormat {
    fn default_table_name(&self) -> &'static str {
        "csv_data"
    }

    fn infer_schema(&self, path: &Path, table_name: &str) -> CResult<TableInfo> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let columns = headers
            .iter()
            .map(|name| ColumnInfo::new(name, "varchar"))
            .collect();
        Ok(TableInfo::new(table_name, columns))
    }

    fn read_rows(&self, path: &Path, info: &TableInfo) -> CResult<Vec<Row>> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = Row::new();
            for (idx, field) in record.iter().enumerate() {
                let name = headers
                    .get(idx)
                    .map(|h| h.to_string())
                    .unwrap_or_else(|| format!("col{idx}"));
                row.set(name, Value::String(field.to_string()));
            }
            // Fill in columns the record didn't carry (short rows) as null.
            for column in &info.columns {
                if row.get(&column.name).is_none() {
                    row.set(column.name.clone(), Value::Null);
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn write_rows(&self, path: &Path, info: &TableInfo, rows: &[Row]) -> CResult<()> {
        let tmp = tempfile::NamedTempFile::new_in(
            path.parent().ok_or_else(|| ReError::Error("data path has no parent directory".into()))?,
        )?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            let headers: Vec<&str> = info.columns.iter().map(|c| c.name.as_str()).collect();
            writer.write_record(&headers)?;
            for row in rows {
                let fields: Vec<String> = info
                    .columns
                    .iter()
                    .map(|c| row.get(&c.name).map(Value::to_text).unwrap_or_default())
                    .collect();
                writer.write_record(&fields)?;
            }
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| ReError::Error(format!("atomic write-back failed: {e}")))?;
        Ok(())
    }
}

impl From<csv::Error> for ReError {
    fn from(e: csv::Error) -> Self {
        ReError::Error(format!("csv error: {e}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("users.csv");
        std::fs::write(&path, "id,name\n1,ada\n2,grace\n").unwrap();
        path
    }

    #[test]
    fn infers_header_as_varchar_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let info = CsvFormat.infer_schema(&path, "csv_data").unwrap();
        assert_eq!(info.columns.len(), 2);
        assert_eq!(info.columns[0].name, "id");
        assert_eq!(info.columns[0].type_name, "varchar");
    }

    #[test]
    fn reads_rows_keyed_by_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let info = CsvFormat.infer_schema(&path, "csv_data").unwrap();
        let rows = CsvFormat.read_rows(&path, &info).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Value::String("ada".into())));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let info = TableInfo::new(
            "csv_data",
            vec![ColumnInfo::new("id", "varchar"), ColumnInfo::new("name", "varchar")],
        );
        let mut row = Row::new();
        row.set("id", Value::String("1".into()));
        row.set("name", Value::String("ada".into()));
        CsvFormat.write_rows(&path, &info, &[row]).unwrap();
        let rows = CsvFormat.read_rows(&path, &info).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::String("ada".into())));
    }
}
