use bytes::{BufMut, BytesMut};
use common::err::ReError;

use crate::constants::ERR_HEADER;

/// Encodes an ERR packet: header 0xFF, 2-byte error code, `#` marker,
/// 5-byte SQLSTATE, UTF-8 message.
pub fn encode_err(code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(ERR_HEADER);
    buf.put_u16_le(code);
    buf.put_u8(b'#');
    let state_bytes = sql_state.as_bytes();
    let mut padded = [b'0'; 5];
    let n = state_bytes.len().min(5);
    padded[..n].copy_from_slice(&state_bytes[..n]);
    buf.put_slice(&padded);
    buf.put_slice(message.as_bytes());
    buf.to_vec()
}

pub fn encode_err_from(err: &ReError) -> Vec<u8> {
    encode_err(err.error_code(), err.sql_state(), &err.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn carries_sqlstate_and_hash_marker() {
        let packet = encode_err(1064, "42000", "syntax error");
        assert_eq!(packet[0], ERR_HEADER);
        assert_eq!(packet[3], b'#');
        assert_eq!(&packet[4..9], b"42000");
        assert_eq!(&packet[9..], b"syntax error");
    }

    #[test]
    fn encode_err_from_reerror_uses_mapped_code() {
        let packet = encode_err_from(&ReError::TableNotFound("users".into()));
        let code = u16::from_le_bytes([packet[1], packet[2]]);
        assert_eq!(code, 1146);
    }
}
