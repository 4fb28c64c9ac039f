use bytes::{Buf, BufMut, BytesMut};
use common::err::{CResult, ReError};

use crate::constants::LENENC_NULL;

/// Writes a MySQL length-encoded integer: 1 byte for <0xFB, 0xFC+2 bytes,
/// 0xFD+3 bytes, 0xFE+8 bytes.
pub fn write_lenenc_int(buf: &mut BytesMut, value: u64) {
    if value < 0xFB {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u8(0xFC);
        buf.put_u16_le(value as u16);
    } else if value <= 0x00FF_FFFF {
        buf.put_u8(0xFD);
        buf.put_uint_le(value, 3);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(value);
    }
}

/// Reads a length-encoded integer; returns `None` when the leading byte is
/// `0xFB` (the lenenc-null marker) rather than a real length.
pub fn read_lenenc_int(buf: &mut impl Buf) -> CResult<Option<u64>> {
    if !buf.has_remaining() {
        return Err(ReError::InvalidPacket("lenenc int: empty buffer".into()));
    }
    let first = buf.get_u8();
    match first {
        LENENC_NULL => Ok(None),
        0xFC => {
            if buf.remaining() < 2 {
                return Err(ReError::InvalidPacket("lenenc int: truncated 0xFC".into()));
            }
            Ok(Some(buf.get_u16_le() as u64))
        }
        0xFD => {
            if buf.remaining() < 3 {
                return Err(ReError::InvalidPacket("lenenc int: truncated 0xFD".into()));
            }
            Ok(Some(buf.get_uint_le(3)))
        }
        0xFE => {
            if buf.remaining() < 8 {
                return Err(ReError::InvalidPacket("lenenc int: truncated 0xFE".into()));
            }
            Ok(Some(buf.get_u64_le()))
        }
        n => Ok(Some(n as u64)),
    }
}

pub fn write_lenenc_string(buf: &mut BytesMut, s: &str) {
    write_lenenc_int(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

pub fn write_lenenc_bytes(buf: &mut BytesMut, data: &[u8]) {
    write_lenenc_int(buf, data.len() as u64);
    buf.put_slice(data);
}

pub fn write_null(buf: &mut BytesMut) {
    buf.put_u8(LENENC_NULL);
}

pub fn read_lenenc_string(buf: &mut impl Buf) -> CResult<Option<String>> {
    match read_lenenc_int(buf)? {
        None => Ok(None),
        Some(len) => {
            let len = len as usize;
            if buf.remaining() < len {
                return Err(ReError::InvalidPacket("lenenc string: truncated".into()));
            }
            let mut bytes = vec![0u8; len];
            buf.copy_to_slice(&mut bytes);
            Ok(Some(String::from_utf8(bytes)?))
        }
    }
}

pub fn read_null_terminated_string(buf: &mut impl Buf) -> CResult<String> {
    let mut bytes = Vec::new();
    loop {
        if !buf.has_remaining() {
            return Err(ReError::Incomplete(common::err::Needed::MissingNull));
        }
        let b = buf.get_u8();
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_all_width_classes() {
        for value in [0u64, 250, 0xFB, 300, 0xFFFF, 0x1_0000, 0x00FF_FFFF, u64::MAX] {
            let mut buf = BytesMut::new();
            write_lenenc_int(&mut buf, value);
            let mut reader = buf.freeze();
            let decoded = read_lenenc_int(&mut reader).unwrap();
            assert_eq!(decoded, Some(value), "failed for {value}");
        }
    }

    #[test]
    fn lenenc_null_decodes_to_none() {
        let mut buf = BytesMut::new();
        write_null(&mut buf);
        let mut reader = buf.freeze();
        assert_eq!(read_lenenc_int(&mut reader).unwrap(), None);
    }

    #[test]
    fn lenenc_string_round_trip() {
        let mut buf = BytesMut::new();
        write_lenenc_string(&mut buf, "hello world");
        let mut reader = buf.freeze();
        assert_eq!(
            read_lenenc_string(&mut reader).unwrap(),
            Some("hello world".to_string())
        );
    }

    #[test]
    fn null_terminated_string_stops_at_zero_byte() {
        let mut buf = BytesMut::new();
        buf.put_slice(b"root\0trailing");
        let mut reader = buf.freeze();
        assert_eq!(read_null_terminated_string(&mut reader).unwrap(), "root");
    }
}
