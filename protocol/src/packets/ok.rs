use bytes::{BufMut, BytesMut};

use crate::constants::OK_HEADER;
use crate::lenenc::write_lenenc_int;

/// Encodes an OK packet: header 0x00, lenenc affected-rows, lenenc
/// last-insert-id, 2-byte status flags, 2-byte warning count.
pub fn encode_ok(affected_rows: u64, last_insert_id: u64, status_flags: u16, warnings: u16) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(OK_HEADER);
    write_lenenc_int(&mut buf, affected_rows);
    write_lenenc_int(&mut buf, last_insert_id);
    buf.put_u16_le(status_flags);
    buf.put_u16_le(warnings);
    buf.to_vec()
}
