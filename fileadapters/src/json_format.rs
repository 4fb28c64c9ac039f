use std::path::Path;

use common::err::{CResult, ReError};
use common::row::{ColumnInfo, Row, TableInfo};
use serde_json::Value as JsonValue;

use crate::format::FileFormat;

pub(crate) fn json_to_value(v: &JsonValue) -> common::row::Value {
    use common::row::Value;
    match v {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        JsonValue::Object(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
        }
    }
}

pub(crate) fn value_to_json(v: &common::row::Value) -> JsonValue {
    use common::row::Value;
    match v {
        Value::Null => JsonValue::Null,
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => JsonValue::from(*f),
        Value::Bool(b) => JsonValue::from(*b),
        Value::String(s) => JsonValue::from(s.clone()),
        Value::Bytes(b) => JsonValue::from(String::from_utf8_lossy(b).to_string()),
        Value::DateTime(dt) => JsonValue::from(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::List(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect()),
    }
}

pub(crate) fn object_to_row(obj: &serde_json::Map<String, JsonValue>) -> Row {
    let mut row = Row::new();
    for (key, value) in obj {
        row.set(key.clone(), json_to_value(value));
    }
    row
}

pub(crate) fn infer_columns(obj: &serde_json::Map<String, JsonValue>) -> Vec<ColumnInfo> {
    obj.keys()
        .map(|k| ColumnInfo::new(k.clone(), json_type_name(obj.get(k).unwrap())))
        .collect()
}

fn json_type_name(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "varchar",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() => "bigint",
        JsonValue::Number(_) => "double",
        JsonValue::String(_) => "varchar",
        JsonValue::Array(_) | JsonValue::Object(_) => "json",
    }
}

/// A whole file is a single JSON array of flat objects; each object becomes
/// a row, each key a column.
pub struct JsonFormat;

impl FileFormat for JsonFormat {
    fn default_table_name(&self) -> &'static str {
        "json_data"
    }

    fn infer_schema(&self, path: &Path, table_name: &str) -> CResult<TableInfo> {
        let text = std::fs::read_to_string(path)?;
        let parsed: JsonValue =
            serde_json::from_str(&text).map_err(|e| ReError::Error(format!("invalid json: {e}")))?;
        let first = parsed
            .as_array()
            .and_then(|a| a.first())
            .and_then(|v| v.as_object())
            .ok_or_else(|| ReError::Error("json file must be an array of objects".into()))?;
        Ok(TableInfo::new(table_name, infer_columns(first)))
    }

    fn read_rows(&self, path: &Path, _info: &TableInfo) -> CResult<Vec<Row>> {
        let text = std::fs::read_to_string(path)?;
        let parsed: JsonValue =
            serde_json::from_str(&text).map_err(|e| ReError::Error(format!("invalid json: {e}")))?;
        let array = parsed
            .as_array()
            .ok_or_else(|| ReError::Error("json file must be an array of objects".into()))?;
        array
            .iter()
            .map(|item| {
                item.as_object()
                    .map(object_to_row)
                    .ok_or_else(|| ReError::Error("json array element is not an object".into()))
            })
            .collect()
    }

    fn write_rows(&self, path: &Path, info: &TableInfo, rows: &[Row]) -> CResult<()> {
        let array: Vec<JsonValue> = rows
            .iter()
            .map(|row| {
                let mut map = serde_json::Map::new();
                for column in &info.columns {
                    if let Some(value) = row.get(&column.name) {
                        map.insert(column.name.clone(), value_to_json(value));
                    }
                }
                JsonValue::Object(map)
            })
            .collect();
        let text = serde_json::to_string_pretty(&JsonValue::Array(array))
            .map_err(|e| ReError::Error(format!("json encode error: {e}")))?;
        let tmp = tempfile::NamedTempFile::new_in(
            path.parent().ok_or_else(|| ReError::Error("data path has no parent directory".into()))?,
        )?;
        std::fs::write(tmp.path(), text)?;
        tmp.persist(path).map_err(|e| ReError::Error(format!("atomic write-back failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::Value;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("users.json");
        std::fs::write(&path, r#"[{"id":1,"name":"ada"},{"id":2,"name":"grace"}]"#).unwrap();
        path
    }

    #[test]
    fn infers_columns_from_first_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let info = JsonFormat.infer_schema(&path, "json_data").unwrap();
        assert_eq!(info.columns.len(), 2);
    }

    #[test]
    fn reads_rows_from_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let info = JsonFormat.infer_schema(&path, "json_data").unwrap();
        let rows = JsonFormat.read_rows(&path, &info).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Value::String("ada".into())));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let info = TableInfo::new("json_data", vec![ColumnInfo::new("id", "bigint"), ColumnInfo::new("name", "varchar")]);
        let mut row = Row::new();
        row.set("id", Value::Int(1));
        row.set("name", Value::String("ada".into()));
        JsonFormat.write_rows(&path, &info, &[row]).unwrap();
        let rows = JsonFormat.read_rows(&path, &info).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
    }
}
