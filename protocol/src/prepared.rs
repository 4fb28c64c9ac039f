use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Buf;
use common::err::{CResult, ReError};
use common::row::Value;

use crate::packets::ColumnDefinition;

/// Counts `?` placeholders in a statement's SQL text, skipping those that
/// fall inside single-quoted, double-quoted, or backtick-quoted literals,
/// and inside `-- `/`#` line comments or `/* */` block comments.
pub fn count_parameters(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut count = 0;
    let mut i = 0;
    let mut quote: Option<u8> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    while i < bytes.len() {
        let b = bytes[i];
        if in_line_comment {
            if b == b'\n' {
                in_line_comment = false;
            }
            i += 1;
            continue;
        }
        if in_block_comment {
            if b == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        if let Some(q) = quote {
            if b == q {
                quote = None;
            } else if b == b'\\' {
                i += 1; // skip escaped char
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => {
                quote = Some(b);
                i += 1;
            }
            b'-' if i + 1 < bytes.len() && bytes[i + 1] == b'-' => {
                in_line_comment = true;
                i += 2;
            }
            b'#' => {
                in_line_comment = true;
                i += 1;
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                in_block_comment = true;
                i += 2;
            }
            b'?' => {
                count += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    count
}

/// A server-side prepared statement slot.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    pub statement_id: u32,
    pub sql: String,
    pub param_count: usize,
    pub columns: Vec<ColumnDefinition>,
}

/// Allocates 32-bit statement ids and stores prepared statements for a
/// single connection.
#[derive(Default)]
pub struct StatementTable {
    next_id: AtomicU32,
    statements: HashMap<u32, PreparedStatement>,
}

impl StatementTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            statements: HashMap::new(),
        }
    }

    pub fn prepare(&mut self, sql: impl Into<String>, columns: Vec<ColumnDefinition>) -> u32 {
        let sql = sql.into();
        let statement_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let param_count = count_parameters(&sql);
        self.statements.insert(
            statement_id,
            PreparedStatement {
                statement_id,
                sql,
                param_count,
                columns,
            },
        );
        statement_id
    }

    pub fn get(&self, statement_id: u32) -> Option<&PreparedStatement> {
        self.statements.get(&statement_id)
    }

    pub fn close(&mut self, statement_id: u32) {
        self.statements.remove(&statement_id);
    }
}

/// Binary-protocol type tags used in `COM_STMT_EXECUTE` parameter headers,
/// the subset this server accepts.
mod param_type {
    pub const MYSQL_TYPE_TINY: u8 = 0x01;
    pub const MYSQL_TYPE_LONGLONG: u8 = 0x08;
    pub const MYSQL_TYPE_DOUBLE: u8 = 0x05;
    pub const MYSQL_TYPE_VAR_STRING: u8 = 0xfd;
    pub const MYSQL_TYPE_STRING: u8 = 0xfe;
    pub const MYSQL_TYPE_BLOB: u8 = 0xfc;
    pub const MYSQL_TYPE_NULL: u8 = 0x06;
}

/// Decodes the typed parameters from a `COM_STMT_EXECUTE` payload tail:
/// a null bitmap (`(param_count + 7) / 8` bytes), a new-params-bound flag,
/// one type tag per param when that flag is set, then the values in order.
pub fn decode_execute_params(mut payload: &[u8], param_count: usize) -> CResult<Vec<Value>> {
    if param_count == 0 {
        return Ok(Vec::new());
    }
    let bitmap_len = (param_count + 7) / 8;
    if payload.len() < bitmap_len + 1 {
        return Err(ReError::InvalidPacket(
            "COM_STMT_EXECUTE: truncated parameter header".into(),
        ));
    }
    let null_bitmap = &payload[..bitmap_len];
    payload.advance(bitmap_len);
    let new_params_bound = payload.get_u8();

    let mut types = Vec::with_capacity(param_count);
    if new_params_bound == 1 {
        if payload.remaining() < param_count * 2 {
            return Err(ReError::InvalidPacket(
                "COM_STMT_EXECUTE: truncated type list".into(),
            ));
        }
        for _ in 0..param_count {
            let ty = payload.get_u8();
            let _unsigned_flag = payload.get_u8();
            types.push(ty);
        }
    } else {
        return Err(ReError::InvalidPacket(
            "COM_STMT_EXECUTE: re-execute without bound types is not supported".into(),
        ));
    }

    let mut values = Vec::with_capacity(param_count);
    for (i, ty) in types.iter().enumerate() {
        let is_null = (null_bitmap[i / 8] & (1 << (i % 8))) != 0;
        if is_null {
            values.push(Value::Null);
            continue;
        }
        let value = match *ty {
            param_type::MYSQL_TYPE_NULL => Value::Null,
            param_type::MYSQL_TYPE_TINY => {
                if !payload.has_remaining() {
                    return Err(ReError::InvalidPacket("truncated tinyint param".into()));
                }
                Value::Int(payload.get_u8() as i64)
            }
            param_type::MYSQL_TYPE_LONGLONG => {
                if payload.remaining() < 8 {
                    return Err(ReError::InvalidPacket("truncated longlong param".into()));
                }
                Value::Int(payload.get_i64_le())
            }
            param_type::MYSQL_TYPE_DOUBLE => {
                if payload.remaining() < 8 {
                    return Err(ReError::InvalidPacket("truncated double param".into()));
                }
                Value::Float(payload.get_f64_le())
            }
            param_type::MYSQL_TYPE_VAR_STRING
            | param_type::MYSQL_TYPE_STRING
            | param_type::MYSQL_TYPE_BLOB => {
                let len = crate::lenenc::read_lenenc_int(&mut payload)?
                    .ok_or_else(|| ReError::InvalidPacket("string param: unexpected null lenenc".into()))?
                    as usize;
                if payload.remaining() < len {
                    return Err(ReError::InvalidPacket("truncated string param".into()));
                }
                let mut bytes = vec![0u8; len];
                payload.copy_to_slice(&mut bytes);
                Value::String(String::from_utf8(bytes)?)
            }
            other => {
                return Err(ReError::InvalidPacket(format!(
                    "unsupported parameter type tag 0x{other:02x}"
                )))
            }
        };
        values.push(value);
    }
    Ok(values)
}
