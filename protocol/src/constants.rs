/// Header is 3-byte little-endian length + 1-byte sequence id.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Payload length that signals "this message continues in the next frame".
pub const MAX_PAYLOAD_LEN: u32 = 0x00FF_FFFF;

pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

pub const NULL_TERMINATOR: u8 = 0x00;

pub const UTF8_MB4_GENERAL_CI: u8 = 45;

pub const PROTOCOL_VERSION_10: u8 = 10;

pub const LENENC_NULL: u8 = 0xFB;

// MySQL command codes (§6).
pub const COM_SLEEP: u8 = 0x00;
pub const COM_QUIT: u8 = 0x01;
pub const COM_INIT_DB: u8 = 0x02;
pub const COM_QUERY: u8 = 0x03;
pub const COM_FIELD_LIST: u8 = 0x04;
pub const COM_REFRESH: u8 = 0x07;
pub const COM_STATISTICS: u8 = 0x09;
pub const COM_PROCESS_INFO: u8 = 0x0a;
pub const COM_PROCESS_KILL: u8 = 0x0c;
pub const COM_DEBUG: u8 = 0x0d;
pub const COM_PING: u8 = 0x0e;
pub const COM_SHUTDOWN: u8 = 0x0f;
pub const COM_STMT_PREPARE: u8 = 0x16;
pub const COM_STMT_EXECUTE: u8 = 0x17;
pub const COM_STMT_CLOSE: u8 = 0x19;
pub const COM_SET_OPTION: u8 = 0x1b;

// Response packet header bytes.
pub const OK_HEADER: u8 = 0x00;
pub const EOF_HEADER: u8 = 0xFE;
pub const ERR_HEADER: u8 = 0xFF;

pub mod auth_plugin_names {
    pub const MY_SQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
}
