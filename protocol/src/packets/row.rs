use bytes::BytesMut;
use common::row::Value;

use crate::lenenc::{write_lenenc_string, write_null};

/// Encodes one row using the text protocol: each value is a length-encoded
/// string, `0xFB` for null.
pub fn encode_row_text(values: &[Value]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for value in values {
        if value.is_null() {
            write_null(&mut buf);
        } else {
            write_lenenc_string(&mut buf, &value.to_text());
        }
    }
    buf.to_vec()
}

/// Computes the binary-protocol null-bitmap header used by
/// `COM_STMT_EXECUTE` result rows: `(column_count + 7 + offset) / 8` bytes,
/// offset is 2 for result rows.
pub fn encode_row_null_bitmap_header(values: &[Value]) -> Vec<u8> {
    let bitmap_len = (values.len() + 7 + 2) / 8;
    let mut bitmap = vec![0u8; bitmap_len];
    for (i, value) in values.iter().enumerate() {
        if value.is_null() {
            let bit_pos = i + 2;
            bitmap[bit_pos / 8] |= 1 << (bit_pos % 8);
        }
    }
    bitmap
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_value_encodes_as_lenenc_null_marker() {
        let row = encode_row_text(&[Value::Null]);
        assert_eq!(row, vec![0xFB]);
    }

    #[test]
    fn non_null_value_encodes_as_lenenc_string() {
        let row = encode_row_text(&[Value::Int(42)]);
        assert_eq!(row, vec![2, b'4', b'2']);
    }

    #[test]
    fn null_bitmap_marks_null_columns() {
        let bitmap = encode_row_null_bitmap_header(&[Value::Null, Value::Int(1)]);
        assert_eq!(bitmap[0] & (1 << 2), 1 << 2);
        assert_eq!(bitmap[0] & (1 << 3), 0);
    }
}
