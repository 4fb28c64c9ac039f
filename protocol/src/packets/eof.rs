use bytes::{BufMut, BytesMut};

use crate::constants::EOF_HEADER;

/// Encodes an EOF packet: header 0xFE, 2-byte warning count, 2-byte status
/// flags — at most 8 payload bytes total, per §6.
pub fn encode_eof(warnings: u16, status_flags: u16) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(EOF_HEADER);
    buf.put_u16_le(warnings);
    buf.put_u16_le(status_flags);
    buf.to_vec()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eof_is_at_most_five_bytes() {
        let eof = encode_eof(0, 2);
        assert!(eof.len() <= 8);
        assert_eq!(eof[0], EOF_HEADER);
    }
}
