use bytes::{BufMut, BytesMut};
use common::row::Value;
use protocol::packets::encode_eof;

/// Encodes the `COM_STMT_PREPARE_OK` acknowledgement: header byte, 4-byte
/// statement id, 2-byte column count, 2-byte param count, a filler byte,
/// and a 2-byte warning count. This server never reports param/column type
/// metadata back (`num_columns` is always reported as zero since the
/// result shape isn't known until `COM_STMT_EXECUTE` actually runs the
/// query), so no follow-up definition/EOF frames are needed.
pub fn encode_stmt_prepare_ok(statement_id: u32, param_count: u16, warning_count: u16) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(0x00);
    buf.put_u32_le(statement_id);
    buf.put_u16_le(0); // num_columns
    buf.put_u16_le(param_count);
    buf.put_u8(0); // filler
    buf.put_u16_le(warning_count);
    buf.to_vec()
}

/// Encodes the parameter placeholder frames a client expects after
/// `COM_STMT_PREPARE_OK` when `param_count > 0`: one generic column
/// definition per placeholder (this server doesn't know a parameter's
/// intended type ahead of execution) followed by an EOF marker.
pub fn encode_stmt_param_defs(param_count: u16) -> Vec<Vec<u8>> {
    if param_count == 0 {
        return Vec::new();
    }
    let mut frames: Vec<Vec<u8>> = (0..param_count)
        .map(|_| {
            protocol::packets::ColumnDefinition::new("?", protocol::packets::column_type::MYSQL_TYPE_VAR_STRING)
                .encode()
        })
        .collect();
    frames.push(encode_eof(0, 0));
    frames
}

/// Substitutes each `?` placeholder in `sql` (outside quoted literals, in
/// order) with its bound value rendered as a SQL literal. Prepared
/// statements are executed by rewriting them into plain text and running
/// them through the same dispatcher as `COM_QUERY`, rather than carrying a
/// separate parameterized execution path end to end.
pub fn substitute_placeholders(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut params = params.iter();
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => match params.next() {
                    Some(value) => out.push_str(&value_to_sql_literal(value)),
                    None => out.push(c),
                },
                _ => out.push(c),
            },
        }
    }
    out
}

fn value_to_sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_text().replace('\'', "''")),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn substitutes_in_order_and_skips_placeholders_in_literals() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?";
        let params = vec![Value::Int(1), Value::String("x".to_string())];
        let rendered = substitute_placeholders(sql, &params);
        assert_eq!(rendered, "SELECT * FROM t WHERE a = 1 AND b = '?' AND c = 'x'");
    }

    #[test]
    fn escapes_single_quotes_in_string_params() {
        let rendered = substitute_placeholders("SELECT ?", &[Value::String("a'b".to_string())]);
        assert_eq!(rendered, "SELECT 'a''b'");
    }
}
