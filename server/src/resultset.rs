use common::err::CResult;
use common::row::{Row, Value};
use protocol::channel::PacketChannel;
use protocol::lenenc::write_lenenc_int;
use protocol::packets::{column_type, encode_eof, encode_row_text, ColumnDefinition};
use tokio::io::{AsyncRead, AsyncWrite};

/// Picks a wire column type from the first non-null value observed for
/// that column; an all-null column falls back to `VAR_STRING`, matching
/// how a client would otherwise have to guess anyway.
fn column_type_for(value: &Value) -> u8 {
    match value {
        Value::Int(_) => column_type::MYSQL_TYPE_LONGLONG,
        Value::Float(_) => column_type::MYSQL_TYPE_DOUBLE,
        Value::Bool(_) => column_type::MYSQL_TYPE_TINY,
        Value::DateTime(_) => column_type::MYSQL_TYPE_DATETIME,
        Value::Bytes(_) | Value::List(_) | Value::Map(_) => column_type::MYSQL_TYPE_BLOB,
        Value::String(_) => column_type::MYSQL_TYPE_VAR_STRING,
        Value::Null => column_type::MYSQL_TYPE_NULL,
    }
}

/// Builds one `ColumnDefinition` per named column, typed from the first row
/// that has a non-null value in that position; with no rows at all every
/// column is reported as `VAR_STRING`.
pub fn column_definitions(names: &[String], rows: &[Row]) -> Vec<ColumnDefinition> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let sample = rows
                .iter()
                .filter_map(|r| r.values().nth(i))
                .find(|v| !v.is_null());
            let tag = sample.map(column_type_for).unwrap_or(column_type::MYSQL_TYPE_VAR_STRING);
            ColumnDefinition::new(name.clone(), tag)
        })
        .collect()
}

/// Writes a complete text-protocol result set: column count, column
/// definitions, an EOF marker, every row, then a final EOF carrying the
/// server status flags. Mirrors the teacher's frame-at-a-time write style
/// — each piece is one `write_packet` call against the shared sequence
/// counter.
pub async fn write_result_set<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut PacketChannel<S>,
    seq: &mut u8,
    columns: &[ColumnDefinition],
    rows: &[Row],
    status_flags: u16,
) -> CResult<()> {
    let mut count_buf = bytes::BytesMut::new();
    write_lenenc_int(&mut count_buf, columns.len() as u64);
    channel.write_packet(&count_buf, seq).await?;

    for column in columns {
        channel.write_packet(&column.encode(), seq).await?;
    }
    channel.write_packet(&encode_eof(0, status_flags), seq).await?;

    for row in rows {
        let values: Vec<Value> = row.values().cloned().collect();
        channel.write_packet(&encode_row_text(&values), seq).await?;
    }
    channel.write_packet(&encode_eof(0, status_flags), seq).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn column_type_defaults_to_var_string_for_an_all_null_column() {
        let names = vec!["x".to_string()];
        let rows = vec![Row::from_pairs(vec![("x".to_string(), Value::Null)])];
        let defs = column_definitions(&names, &rows);
        assert_eq!(defs[0].column_type, column_type::MYSQL_TYPE_VAR_STRING);
    }

    #[test]
    fn column_type_is_inferred_from_the_first_non_null_sample() {
        let names = vec!["x".to_string()];
        let rows = vec![
            Row::from_pairs(vec![("x".to_string(), Value::Null)]),
            Row::from_pairs(vec![("x".to_string(), Value::Int(5))]),
        ];
        let defs = column_definitions(&names, &rows);
        assert_eq!(defs[0].column_type, column_type::MYSQL_TYPE_LONGLONG);
    }
}
