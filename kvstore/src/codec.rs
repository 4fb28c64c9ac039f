use common::err::{CResult, ReError};
use common::row::{Row, TableInfo};

const ROW_PREFIX: &str = "row\u{0}";
const META_PREFIX: &str = "meta\u{0}";

pub fn table_meta_key(table: &str) -> Vec<u8> {
    format!("{META_PREFIX}{table}").into_bytes()
}

pub fn row_key(table: &str, row_key_text: &str) -> Vec<u8> {
    format!("{ROW_PREFIX}{table}\u{0}{row_key_text}").into_bytes()
}

pub fn row_prefix(table: &str) -> Vec<u8> {
    format!("{ROW_PREFIX}{table}\u{0}").into_bytes()
}

pub fn encode_row(row: &Row) -> CResult<Vec<u8>> {
    bincode::serialize(row).map_err(|e| ReError::Error(format!("row encode error: {e}")))
}

pub fn decode_row(bytes: &[u8]) -> CResult<Row> {
    bincode::deserialize(bytes).map_err(|e| ReError::Error(format!("row decode error: {e}")))
}

pub fn encode_table_info(info: &TableInfo) -> CResult<Vec<u8>> {
    bincode::serialize(info).map_err(|e| ReError::Error(format!("table info encode error: {e}")))
}

pub fn decode_table_info(bytes: &[u8]) -> CResult<TableInfo> {
    bincode::deserialize(bytes).map_err(|e| ReError::Error(format!("table info decode error: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::Value;

    #[test]
    fn row_round_trips_through_bincode() {
        let mut row = Row::new();
        row.set("id", Value::Int(1));
        row.set("name", Value::String("ada".into()));
        let bytes = encode_row(&row).unwrap();
        let decoded = decode_row(&bytes).unwrap();
        assert_eq!(row, decoded);
    }

    #[test]
    fn row_key_is_scoped_under_its_table_prefix() {
        let key = row_key("users", "42");
        assert!(key.starts_with(&row_prefix("users")));
    }
}
