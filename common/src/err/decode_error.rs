use std::fmt::Display;
use std::io;
use std::num::ParseIntError;
use std::str::Utf8Error;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Central error type for the whole server. Mirrors the shape of the
/// handwritten `ReError` the source built its error handling on, but is
/// `thiserror`-derived so every variant gets `Display`/`Error` for free and
/// `?` composes across crate boundaries without manual `impl Display`.
#[derive(Debug, Error)]
pub enum ReError {
    /// A bug: a codepath we believe is unreachable was reached.
    #[error("BUG: {0}")]
    Bug(String),

    #[error("{0}")]
    Error(String),

    //////////////////////
    // Wire protocol (C1/C2)
    //////////////////////
    #[error("packet too large: {0} bytes exceeds max_packet_size")]
    PacketTooLarge(u32),

    #[error("packet sequence out of order: expected {expected}, got {got}")]
    PacketSequence { expected: u8, got: u8 },

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("unknown command code: 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("authentication failed for user '{0}'")]
    AuthFailed(String),

    //////////////////////
    // SQL
    //////////////////////
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("duplicate entry for key '{0}'")]
    DuplicateKey(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    //////////////////////
    // Backend / data-source (C4)
    //////////////////////
    #[error("data source not connected: {0}")]
    NotConnected(String),

    #[error("data source is read-only: cannot {0}")]
    ReadOnly(String),

    #[error("type conversion error: field '{field}' from {from} to {to}, value={value}")]
    TypeConversion {
        field: String,
        from: String,
        to: String,
        value: String,
    },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("data source type already registered: {0}")]
    DuplicateRegistration(String),

    #[error("data source not found: {0}")]
    DataSourceNotFound(String),

    //////////////////////
    // Execution (C8/C9)
    //////////////////////
    #[error("query canceled")]
    Canceled,

    #[error("query timed out")]
    Timeout,

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("query not found: {0}")]
    QueryNotFound(String),

    #[error("Unknown thread id: {0}")]
    UnknownThreadId(u32),

    //////////////////////
    // IO / encoding
    //////////////////////
    #[error("io error: {0}")]
    IoError(#[from] io::Error),

    #[error("utf8 error: {0}")]
    Utf8Error(#[from] Utf8Error),

    #[error("from-utf8 error: {0}")]
    FromUtf8Error(#[from] FromUtf8Error),

    #[error("parse-int error: {0}")]
    ParseIntError(#[from] ParseIntError),

    #[error("incomplete: {0}")]
    Incomplete(Needed),

    #[error("config error: {0}")]
    ConfigError(String),
}

impl ReError {
    /// MySQL error code used when formatting this error into an ERR packet.
    pub fn error_code(&self) -> u16 {
        match self {
            ReError::ParseError(_) => 1064,
            ReError::TableNotFound(_) => 1146,
            ReError::ColumnNotFound(_) => 1054,
            ReError::DatabaseNotFound(_) => 1049,
            ReError::DuplicateKey(_) => 1062,
            ReError::UnknownThreadId(_) => 1094,
            ReError::QueryNotFound(_) => 1094,
            ReError::AuthFailed(_) => 1045,
            ReError::ReadOnly(_) => 1290,
            ReError::UnknownCommand(_) => 1047,
            ReError::Canceled | ReError::Timeout => 1317,
            _ => 1105,
        }
    }

    /// SQLSTATE 5-char code used alongside `error_code`.
    pub fn sql_state(&self) -> &'static str {
        match self {
            ReError::ParseError(_) => "42000",
            ReError::TableNotFound(_) => "42S02",
            ReError::ColumnNotFound(_) => "42S22",
            ReError::DatabaseNotFound(_) => "42000",
            ReError::DuplicateKey(_) => "23000",
            ReError::ConstraintViolation(_) => "23000",
            _ => "HY000",
        }
    }
}

/// Describes what more-data was needed when a decode produced `Incomplete`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Needed {
    Unknown,
    NoEnoughData,
    InvalidUtf8,
    MissingNull,
    InvalidData(String),
}

impl Display for Needed {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Needed::Unknown => write!(f, "unknown"),
            Needed::NoEnoughData => write!(f, "not enough data"),
            Needed::InvalidUtf8 => write!(f, "invalid utf8"),
            Needed::MissingNull => write!(f, "missing null terminator"),
            Needed::InvalidData(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ReError::TableNotFound("t".into()).error_code(), 1146);
        assert_eq!(ReError::TableNotFound("t".into()).sql_state(), "42S02");
    }
}
