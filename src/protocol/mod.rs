//! Protocol Module
//!
//! Wire protocol between `segmentkv-cli` and `segmentkv-server`.
//!
//! Every message is one frame:
//! ```text
//! ┌───────────────────┬──────────────┬──────────────────────┐
//! │ Cmd / Status (1)  │ Len (4, BE)  │       Payload        │
//! └───────────────────┴──────────────┴──────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET     - Payload: key_len (4) + key
//! - 0x02: PUT     - Payload: key_len (4) + key + value
//! - 0x03: FLUSH   - Payload: empty
//! - 0x04: PING    - Payload: empty
//! - 0x05: COMPACT - Payload: empty
//!
//! ### Status Codes
//! - 0x00: OK (payload: value, summary or nothing)
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR (payload: message)

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
