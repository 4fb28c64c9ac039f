use common::err::{CResult, ReError};

use crate::constants::*;

/// A parsed client command. The minimum required set from §4.2.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    InitDb(String),
    Query(String),
    FieldList { table: String, wildcard: String },
    Refresh(u8),
    Statistics,
    ProcessInfo,
    ProcessKill(u32),
    Debug,
    Shutdown,
    Ping,
    SetOption(u16),
    StmtPrepare(String),
    StmtExecute { statement_id: u32, payload: Vec<u8> },
    StmtClose(u32),
}

impl Command {
    /// Parses a command packet's payload; `payload[0]` is the command code.
    pub fn parse(payload: &[u8]) -> CResult<Self> {
        if payload.is_empty() {
            return Err(ReError::InvalidPacket("empty command packet".into()));
        }
        let code = payload[0];
        let body = &payload[1..];
        match code {
            COM_QUIT => Ok(Command::Quit),
            COM_INIT_DB => Ok(Command::InitDb(String::from_utf8_lossy(body).to_string())),
            COM_QUERY => Ok(Command::Query(String::from_utf8_lossy(body).to_string())),
            COM_FIELD_LIST => {
                let nul = body.iter().position(|&b| b == 0).unwrap_or(body.len());
                let table = String::from_utf8_lossy(&body[..nul]).to_string();
                let wildcard = if nul + 1 <= body.len() {
                    String::from_utf8_lossy(&body[nul + 1..]).to_string()
                } else {
                    String::new()
                };
                Ok(Command::FieldList { table, wildcard })
            }
            COM_REFRESH => Ok(Command::Refresh(body.first().copied().unwrap_or(0))),
            COM_STATISTICS => Ok(Command::Statistics),
            COM_PROCESS_INFO => Ok(Command::ProcessInfo),
            COM_PROCESS_KILL => {
                if body.len() < 4 {
                    return Err(ReError::InvalidPacket("COM_PROCESS_KILL missing thread id".into()));
                }
                let tid = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                Ok(Command::ProcessKill(tid))
            }
            COM_DEBUG => Ok(Command::Debug),
            COM_SHUTDOWN => Ok(Command::Shutdown),
            COM_PING => Ok(Command::Ping),
            COM_SET_OPTION => {
                let opt = if body.len() >= 2 {
                    u16::from_le_bytes([body[0], body[1]])
                } else {
                    0
                };
                Ok(Command::SetOption(opt))
            }
            COM_STMT_PREPARE => Ok(Command::StmtPrepare(
                String::from_utf8_lossy(body).to_string(),
            )),
            COM_STMT_EXECUTE => {
                if body.len() < 4 {
                    return Err(ReError::InvalidPacket("COM_STMT_EXECUTE missing statement id".into()));
                }
                let statement_id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                Ok(Command::StmtExecute {
                    statement_id,
                    payload: body[4..].to_vec(),
                })
            }
            COM_STMT_CLOSE => {
                if body.len() < 4 {
                    return Err(ReError::InvalidPacket("COM_STMT_CLOSE missing statement id".into()));
                }
                let statement_id = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                Ok(Command::StmtClose(statement_id))
            }
            other => Err(ReError::UnknownCommand(other)),
        }
    }
}
