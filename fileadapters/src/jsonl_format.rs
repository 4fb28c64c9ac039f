use std::io::Write as _;
use std::path::Path;

use common::err::{CResult, ReError};
use common::row::{ColumnInfo, Row, TableInfo};
use serde_json::Value as JsonValue;

use crate::format::FileFormat;
use crate::json_format;

/// JSON Lines: one JSON object per newline-terminated line, no enclosing
/// array. Blank lines are skipped.
pub struct JsonlFormat;

impl FileFormat for JsonlFormat {
    fn default_table_name(&self) -> &'static str {
        "jsonl_data"
    }

    fn infer_schema(&self, path: &Path, table_name: &str) -> CResult<TableInfo> {
        let text = std::fs::read_to_string(path)?;
        let first_line = text
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| ReError::Error("jsonl file is empty".into()))?;
        let parsed: JsonValue =
            serde_json::from_str(first_line).map_err(|e| ReError::Error(format!("invalid json line: {e}")))?;
        let object = parsed
            .as_object()
            .ok_or_else(|| ReError::Error("jsonl line must be an object".into()))?;
        Ok(TableInfo::new(table_name, json_format::infer_columns(object)))
    }

    fn read_rows(&self, path: &Path, _info: &TableInfo) -> CResult<Vec<Row>> {
        let text = std::fs::read_to_string(path)?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                let parsed: JsonValue =
                    serde_json::from_str(line).map_err(|e| ReError::Error(format!("invalid json line: {e}")))?;
                parsed
                    .as_object()
                    .map(json_format::object_to_row)
                    .ok_or_else(|| ReError::Error("jsonl line must be an object".into()))
            })
            .collect()
    }

    fn write_rows(&self, path: &Path, info: &TableInfo, rows: &[Row]) -> CResult<()> {
        let tmp = tempfile::NamedTempFile::new_in(
            path.parent().ok_or_else(|| ReError::Error("data path has no parent directory".into()))?,
        )?;
        {
            let mut file = tmp.as_file();
            for row in rows {
                let mut map = serde_json::Map::new();
                for column in &info.columns {
                    if let Some(value) = row.get(&column.name) {
                        map.insert(column.name.clone(), json_format::value_to_json(value));
                    }
                }
                let line = serde_json::to_string(&JsonValue::Object(map))
                    .map_err(|e| ReError::Error(format!("json encode error: {e}")))?;
                writeln!(file, "{line}")?;
            }
        }
        tmp.persist(path).map_err(|e| ReError::Error(format!("atomic write-back failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::Value;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("users.jsonl");
        std::fs::write(&path, "{\"id\":1,\"name\":\"ada\"}\n{\"id\":2,\"name\":\"grace\"}\n").unwrap();
        path
    }

    #[test]
    fn infers_columns_from_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let info = JsonlFormat.infer_schema(&path, "jsonl_data").unwrap();
        assert_eq!(info.columns.len(), 2);
    }

    #[test]
    fn reads_one_row_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let info = JsonlFormat.infer_schema(&path, "jsonl_data").unwrap();
        let rows = JsonlFormat.read_rows(&path, &info).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some(&Value::String("grace".into())));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let info = TableInfo::new("jsonl_data", vec![ColumnInfo::new("id", "bigint"), ColumnInfo::new("name", "varchar")]);
        let mut row = Row::new();
        row.set("id", Value::Int(7));
        row.set("name", Value::String("grace".into()));
        JsonlFormat.write_rows(&path, &info, &[row]).unwrap();
        let rows = JsonlFormat.read_rows(&path, &info).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(7)));
    }
}
