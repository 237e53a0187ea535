//! Connection Handler
//!
//! Serves one client: read a command, run it, write the response, repeat.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::{read_command, write_response, Response};

/// Handles a single client connection
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    engine: Arc<Engine>,
    /// Peer address for logging
    peer_addr: String,
}

/// Socket errors that just mean the client went away
fn is_disconnect(err: &KvError) -> bool {
    match err {
        KvError::Io(e) => matches!(
            e.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
        ),
        _ => false,
    }
}

impl Connection {
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            engine,
            peer_addr,
        })
    }

    /// Configure socket timeouts; 0 leaves a direction unbounded
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Serve commands until the client disconnects (blocking)
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "connection established");

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(command) => command,
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "bad request");
                    let _ = write_response(&mut self.writer, &Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!(peer = %self.peer_addr, ?command, write = command.is_write(), "command received");

            let response = Response::from_result(self.engine.execute(command));

            match write_response(&mut self.writer, &response) {
                Ok(()) => {}
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!(peer = %self.peer_addr, "client left before the response");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
