use bytes::BytesMut;

use crate::lenenc::write_lenenc_string;

/// Column-definition frame of a result set. Field widths follow
/// `Protocol::ColumnDefinition41`.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: u8) -> Self {
        let name = name.into();
        Self {
            catalog: "def".to_string(),
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: name.clone(),
            org_name: name,
            charset: 45, // utf8mb4_general_ci
            column_length: 255,
            column_type,
            flags: 0,
            decimals: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        write_lenenc_string(&mut buf, &self.catalog);
        write_lenenc_string(&mut buf, &self.schema);
        write_lenenc_string(&mut buf, &self.table);
        write_lenenc_string(&mut buf, &self.org_table);
        write_lenenc_string(&mut buf, &self.name);
        write_lenenc_string(&mut buf, &self.org_name);
        // length of fixed-length fields below, always 0x0c
        crate::lenenc::write_lenenc_int(&mut buf, 0x0c);
        buf.extend_from_slice(&self.charset.to_le_bytes());
        buf.extend_from_slice(&self.column_length.to_le_bytes());
        buf.extend_from_slice(&[self.column_type]);
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&[self.decimals]);
        buf.extend_from_slice(&[0u8; 2]); // filler
        buf.to_vec()
    }
}

/// MySQL column type tags (`Protocol::ColumnType`), the subset this server
/// emits.
pub mod column_type {
    pub const MYSQL_TYPE_DECIMAL: u8 = 0x00;
    pub const MYSQL_TYPE_LONGLONG: u8 = 0x08;
    pub const MYSQL_TYPE_DOUBLE: u8 = 0x05;
    pub const MYSQL_TYPE_VAR_STRING: u8 = 0xfd;
    pub const MYSQL_TYPE_BLOB: u8 = 0xfc;
    pub const MYSQL_TYPE_DATETIME: u8 = 0x0c;
    pub const MYSQL_TYPE_NULL: u8 = 0x06;
    pub const MYSQL_TYPE_TINY: u8 = 0x01;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_fixed_length_marker() {
        let col = ColumnDefinition::new("id", column_type::MYSQL_TYPE_LONGLONG);
        let encoded = col.encode();
        assert!(!encoded.is_empty());
    }
}
