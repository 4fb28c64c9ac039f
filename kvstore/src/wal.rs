use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use common::err::{CResult, ReError};

/// One durable write-ahead-log record: either a key/value write or a
/// tombstone delete.
#[derive(Debug, Clone, PartialEq)]
pub enum WalOp {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

const OP_SET: u8 = 1;
const OP_DELETE: u8 = 2;

/// Appends WAL records to a file: `[crc32][op_tag][key_len][key]([value_len][value])`.
/// `crc32` covers everything after it, guarding against a torn write from a
/// crash mid-append.
pub struct WalWriter {
    file: BufWriter<File>,
}

impl WalWriter {
    pub fn open(path: &Path) -> CResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, op: &WalOp) -> CResult<()> {
        let mut body = Vec::new();
        match op {
            WalOp::Set { key, value } => {
                body.write_u8(OP_SET)?;
                body.write_u32::<LittleEndian>(key.len() as u32)?;
                body.extend_from_slice(key);
                body.write_u32::<LittleEndian>(value.len() as u32)?;
                body.extend_from_slice(value);
            }
            WalOp::Delete { key } => {
                body.write_u8(OP_DELETE)?;
                body.write_u32::<LittleEndian>(key.len() as u32)?;
                body.extend_from_slice(key);
            }
        }
        let crc = crc32fast::hash(&body);
        self.file.write_u32::<LittleEndian>(crc)?;
        self.file.write_all(&body)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Replays every record in a WAL file in order, stopping cleanly at EOF and
/// erroring on a checksum mismatch (a torn tail write is tolerated as EOF,
/// not an error, since the last record of a crashed process is expected to
/// be incomplete).
pub fn replay(path: &Path) -> CResult<Vec<WalOp>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = BufReader::new(File::open(path)?);
    let mut ops = Vec::new();
    loop {
        let crc = match reader.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(_) => break,
        };
        let tag = match reader.read_u8() {
            Ok(v) => v,
            Err(_) => break,
        };
        let mut body = vec![tag];
        let key_len = match reader.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(_) => break,
        };
        body.extend_from_slice(&key_len.to_le_bytes());
        let mut key = vec![0u8; key_len as usize];
        if reader.read_exact(&mut key).is_err() {
            break;
        }
        body.extend_from_slice(&key);

        let op = match tag {
            OP_SET => {
                let value_len = match reader.read_u32::<LittleEndian>() {
                    Ok(v) => v,
                    Err(_) => break,
                };
                body.extend_from_slice(&value_len.to_le_bytes());
                let mut value = vec![0u8; value_len as usize];
                if reader.read_exact(&mut value).is_err() {
                    break;
                }
                body.extend_from_slice(&value);
                WalOp::Set { key, value }
            }
            OP_DELETE => WalOp::Delete { key },
            other => {
                return Err(ReError::InvalidPacket(format!("wal: unknown op tag {other}")));
            }
        };
        if crc32fast::hash(&body) != crc {
            break;
        }
        ops.push(op);
    }
    Ok(ops)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replays_appended_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut writer = WalWriter::open(&path).unwrap();
            writer
                .append(&WalOp::Set { key: b"a".to_vec(), value: b"1".to_vec() })
                .unwrap();
            writer
                .append(&WalOp::Set { key: b"b".to_vec(), value: b"2".to_vec() })
                .unwrap();
            writer.append(&WalOp::Delete { key: b"a".to_vec() }).unwrap();
        }
        let ops = replay(&path).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[2], WalOp::Delete { key: b"a".to_vec() });
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ops = replay(&dir.path().join("missing.log")).unwrap();
        assert!(ops.is_empty());
    }
}
