//! Protocol codec
//!
//! Encoding and decoding of command and response frames.

use std::io::{Read, Write};

use crate::error::{KvError, Result};

use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Framing
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(tag);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

fn payload_len(header: &[u8]) -> Result<usize> {
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "payload too large: {} bytes (max {})",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(len as usize)
}

/// Split a complete frame into its tag and payload
fn unframe(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let total = HEADER_SIZE + payload_len(bytes)?;
    if bytes.len() < total {
        return Err(KvError::Protocol(format!(
            "incomplete payload: expected {} bytes, got {}",
            total,
            bytes.len()
        )));
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..total]))
}

/// Read one whole frame off a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let len = payload_len(&header)?;
    let mut message = vec![0u8; HEADER_SIZE + len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;

    Ok(message)
}

// =============================================================================
// Commands
// =============================================================================

/// Encode a command as cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let payload = match command {
        Command::Get { key } => keyed(key, &[]),
        Command::Put { key, value } => keyed(key, value),
        Command::Flush | Command::Compact | Command::Ping => Vec::new(),
    };

    frame(command.command_type() as u8, &payload)
}

/// key_len (4) + key + rest
fn keyed(key: &[u8], rest: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4 + key.len() + rest.len());
    payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
    payload.extend_from_slice(key);
    payload.extend_from_slice(rest);
    payload
}

/// Inverse of `keyed`
fn split_keyed<'a>(payload: &'a [u8], command: &str) -> Result<(&'a [u8], &'a [u8])> {
    if payload.len() < 4 {
        return Err(KvError::Protocol(format!("{}: missing key length", command)));
    }

    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let body = &payload[4..];
    if body.len() < key_len {
        return Err(KvError::Protocol(format!(
            "{}: incomplete key (expected {}, got {})",
            command,
            key_len,
            body.len()
        )));
    }

    Ok(body.split_at(key_len))
}

/// Decode a command frame
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (tag, payload) = unframe(bytes)?;
    let command_type = CommandType::try_from(tag)?;

    match command_type {
        CommandType::Get => {
            let (key, rest) = split_keyed(payload, "GET")?;
            if !rest.is_empty() {
                return Err(KvError::Protocol(format!(
                    "GET: {} trailing bytes after key",
                    rest.len()
                )));
            }
            Ok(Command::Get { key: key.to_vec() })
        }
        CommandType::Put => {
            let (key, value) = split_keyed(payload, "PUT")?;
            Ok(Command::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            })
        }
        CommandType::Flush | CommandType::Compact | CommandType::Ping => {
            if !payload.is_empty() {
                return Err(KvError::Protocol(format!(
                    "{:?}: unexpected payload of {} bytes",
                    command_type,
                    payload.len()
                )));
            }
            Ok(match command_type {
                CommandType::Flush => Command::Flush,
                CommandType::Compact => Command::Compact,
                _ => Command::Ping,
            })
        }
    }
}

/// Read a complete command from a stream
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    decode_command(&read_frame(reader)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Responses
// =============================================================================

/// Encode a response as status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    frame(response.status as u8, response.payload.as_deref().unwrap_or(&[]))
}

/// Decode a response frame; an empty payload decodes as `None`
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (tag, payload) = unframe(bytes)?;
    let status = Status::try_from(tag)?;

    Ok(Response {
        status,
        payload: (!payload.is_empty()).then(|| payload.to_vec()),
    })
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    decode_response(&read_frame(reader)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}
