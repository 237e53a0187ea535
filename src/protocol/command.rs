//! Client commands

use crate::error::{KvError, Result};

/// Command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Flush = 0x03,
    Ping = 0x04,
    Compact = 0x05,
}

impl TryFrom<u8> for CommandType {
    type Error = KvError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(CommandType::Get),
            0x02 => Ok(CommandType::Put),
            0x03 => Ok(CommandType::Flush),
            0x04 => Ok(CommandType::Ping),
            0x05 => Ok(CommandType::Compact),
            other => Err(KvError::Protocol(format!("unknown command type 0x{:02x}", other))),
        }
    }
}

/// A decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Look up a key across the memtable and every segment
    Get { key: Vec<u8> },

    /// Insert `"<key> <value>"`
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Persist the active generation
    Flush,

    /// Merge undersized segments
    Compact,

    /// Health check
    Ping,
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Flush => CommandType::Flush,
            Command::Compact => CommandType::Compact,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Whether the command changes stored state
    pub fn is_write(&self) -> bool {
        !matches!(self, Command::Get { .. } | Command::Ping)
    }
}
