use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use common::err::{CResult, ReError};
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::capability::CapabilityFlags;
use crate::constants::{auth_plugin_names, NULL_TERMINATOR, PROTOCOL_VERSION_10};
use crate::lenenc::{read_lenenc_int, read_null_terminated_string};

/// The 20-byte auth challenge, split across the handshake's two fixed
/// regions (8 bytes inline, 12 bytes after a filler byte) the way the wire
/// protocol requires.
pub fn generate_scramble() -> [u8; 20] {
    let mut scramble = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut scramble);
    // MySQL disallows NUL and the backtick-adjacent byte 0x00 inside the
    // scramble since it is transmitted as two NUL-terminated chunks.
    for b in scramble.iter_mut() {
        if *b == 0 {
            *b = 1;
        }
    }
    scramble
}

#[derive(Debug, Clone)]
pub struct HandshakeV10 {
    pub server_version: String,
    pub connection_id: u32,
    pub scramble: [u8; 20],
    pub capability_flags: CapabilityFlags,
    pub charset: u8,
    pub status_flags: u16,
    pub auth_plugin_name: String,
}

impl HandshakeV10 {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(PROTOCOL_VERSION_10);
        buf.put_slice(self.server_version.as_bytes());
        buf.put_u8(NULL_TERMINATOR);
        buf.put_u32_le(self.connection_id);
        buf.put_slice(&self.scramble[0..8]);
        buf.put_u8(NULL_TERMINATOR);
        let caps = self.capability_flags.bits();
        buf.put_u16_le((caps & 0xFFFF) as u16);
        buf.put_u8(self.charset);
        buf.put_u16_le(self.status_flags);
        buf.put_u16_le(((caps >> 16) & 0xFFFF) as u16);
        buf.put_u8(21); // auth-plugin-data-len: fixed 20-byte scramble + NUL
        buf.put_slice(&[0u8; 10]); // reserved
        buf.put_slice(&self.scramble[8..20]);
        buf.put_u8(NULL_TERMINATOR);
        buf.put_slice(self.auth_plugin_name.as_bytes());
        buf.put_u8(NULL_TERMINATOR);
        buf.to_vec()
    }

    pub fn parse(data: &[u8]) -> CResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        let protocol_version = buf.get_u8();
        if protocol_version != PROTOCOL_VERSION_10 {
            return Err(ReError::ConnectionError(format!(
                "unsupported protocol version {protocol_version}"
            )));
        }
        let server_version = read_null_terminated_string(&mut buf)?;
        let connection_id = buf.get_u32_le();
        let mut scramble = [0u8; 20];
        scramble[0..8].copy_from_slice(&buf.copy_to_bytes(8));
        buf.advance(1); // filler
        let caps_low = buf.get_u16_le() as u64;
        let charset = buf.get_u8();
        let status_flags = buf.get_u16_le();
        let caps_high = buf.get_u16_le() as u64;
        let capability_flags = CapabilityFlags::from_bits_truncate(caps_low | (caps_high << 16));
        let auth_data_len = buf.get_u8();
        buf.advance(10);
        let second_part_len = (auth_data_len as i32 - 8 - 1).max(0) as usize;
        let remaining = buf.remaining().min(second_part_len).min(12);
        scramble[8..8 + remaining].copy_from_slice(&buf.copy_to_bytes(remaining));
        if buf.has_remaining() {
            buf.advance(1); // NUL terminator of scramble part 2
        }
        let auth_plugin_name = if buf.has_remaining() {
            read_null_terminated_string(&mut buf).unwrap_or_default()
        } else {
            auth_plugin_names::MY_SQL_NATIVE_PASSWORD.to_string()
        };

        Ok(HandshakeV10 {
            server_version,
            connection_id,
            scramble,
            capability_flags,
            charset,
            status_flags,
            auth_plugin_name,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandshakeResponse41 {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub auth_plugin_name: Option<String>,
    pub connect_attrs: HashMap<String, String>,
}

impl HandshakeResponse41 {
    /// Parses a client's handshake-response packet. Every optional field's
    /// presence is gated by a capability flag, per §4.2.
    pub fn parse(data: &[u8]) -> CResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        if buf.remaining() < 4 {
            return Err(ReError::InvalidPacket("handshake response too short".into()));
        }
        let caps_full = buf.get_u32_le() as u64;
        let capability_flags = CapabilityFlags::from_bits_truncate(caps_full);
        let max_packet_size = buf.get_u32_le();
        let charset = buf.get_u8();
        buf.advance(23); // reserved

        let username = read_null_terminated_string(&mut buf)?;

        let auth_response = if capability_flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            let len = read_lenenc_int(&mut buf)?.unwrap_or(0) as usize;
            let mut data = vec![0u8; len.min(buf.remaining())];
            buf.copy_to_slice(&mut data);
            data
        } else if capability_flags.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
            let len = buf.get_u8() as usize;
            let mut data = vec![0u8; len.min(buf.remaining())];
            buf.copy_to_slice(&mut data);
            data
        } else {
            let s = read_null_terminated_string(&mut buf)?;
            s.into_bytes()
        };

        let database = if capability_flags.contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB) {
            Some(read_null_terminated_string(&mut buf)?)
        } else {
            None
        };

        let auth_plugin_name = if capability_flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
            Some(read_null_terminated_string(&mut buf)?)
        } else {
            None
        };

        let mut connect_attrs = HashMap::new();
        if capability_flags.contains(CapabilityFlags::CLIENT_CONNECT_ATTRS) && buf.has_remaining() {
            if let Ok(Some(total_len)) = read_lenenc_int(&mut buf) {
                let end = buf.remaining().saturating_sub(0).min(total_len as usize);
                let mut consumed = 0usize;
                while consumed < end && buf.has_remaining() {
                    let key = match read_lenenc_string(&mut buf) {
                        Ok(Some(k)) => k,
                        _ => break,
                    };
                    let value = match read_lenenc_string(&mut buf) {
                        Ok(Some(v)) => v,
                        _ => break,
                    };
                    consumed += key.len() + value.len() + 2;
                    connect_attrs.insert(key, value);
                }
            }
        }

        Ok(HandshakeResponse41 {
            capability_flags,
            max_packet_size,
            charset,
            username,
            auth_response,
            database,
            auth_plugin_name,
            connect_attrs,
        })
    }
}

fn read_lenenc_string(buf: &mut Bytes) -> CResult<Option<String>> {
    crate::lenenc::read_lenenc_string(buf)
}

/// `mysql_native_password`: SHA1(password) XOR SHA1(scramble ++ SHA1(SHA1(password)))
pub fn scramble_native_password(password: &[u8], scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1 = Sha1::digest(password);
    let stage2 = Sha1::digest(stage1);
    let mut hasher = Sha1::new();
    hasher.update(scramble);
    hasher.update(stage2);
    let stage3 = hasher.finalize();

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// Verifies a client's `mysql_native_password` response against the known
/// plaintext password and the scramble that was sent in the handshake.
pub fn verify_native_password(response: &[u8], password: &[u8], scramble: &[u8]) -> bool {
    if password.is_empty() {
        return response.is_empty();
    }
    let expected = scramble_native_password(password, scramble);
    expected == response
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_handshake() -> HandshakeV10 {
        HandshakeV10 {
            server_version: "8.0.34-sqlsrv".to_string(),
            connection_id: 42,
            scramble: generate_scramble(),
            capability_flags: CapabilityFlags::server_default(),
            charset: crate::constants::UTF8_MB4_GENERAL_CI,
            status_flags: 2,
            auth_plugin_name: auth_plugin_names::MY_SQL_NATIVE_PASSWORD.to_string(),
        }
    }

    #[test]
    fn handshake_round_trips() {
        let hs = sample_handshake();
        let encoded = hs.encode();
        let decoded = HandshakeV10::parse(&encoded).unwrap();
        assert_eq!(decoded.connection_id, 42);
        assert_eq!(decoded.server_version, "8.0.34-sqlsrv");
        assert_eq!(decoded.scramble, hs.scramble);
        assert_eq!(decoded.auth_plugin_name, auth_plugin_names::MY_SQL_NATIVE_PASSWORD);
    }

    #[test]
    fn native_password_scramble_is_verifiable() {
        let scramble = generate_scramble();
        let password = b"s3cret";
        let response = scramble_native_password(password, &scramble);
        assert!(verify_native_password(&response, password, &scramble));
        assert!(!verify_native_password(&response, b"wrong", &scramble));
    }

    #[test]
    fn empty_password_means_empty_response() {
        let scramble = generate_scramble();
        assert!(verify_native_password(&[], b"", &scramble));
    }
}
