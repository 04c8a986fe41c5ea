//! Buffer assembling complete commands from partial socket reads.
//!
//! Frames can arrive fragmented or back-to-back; the buffer accumulates
//! bytes in a `BytesMut` and runs a two-state machine over them:
//! - `AwaitHeader`: need 16 header bytes
//! - `AwaitPayload`: header decoded, need `payload_size` more bytes
//!
//! Any framing error (unknown command type, oversized payload) is
//! unrecoverable for the connection; the caller tears the session down.

use bytes::BytesMut;

use super::command::Command;
use super::wire_format::{CommandHeader, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use crate::error::{RemoteError, Result};

#[derive(Debug, Clone, Copy)]
enum State {
    AwaitHeader,
    AwaitPayload(CommandHeader),
}

/// Accumulates inbound bytes and extracts complete [`Command`]s.
pub struct CommandBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl CommandBuffer {
    /// Create a buffer with the default payload ceiling.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a buffer with a custom payload ceiling.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::AwaitHeader,
            max_payload_size,
        }
    }

    /// Push freshly-read bytes and extract every command they complete.
    ///
    /// Partial data stays buffered for the next push. Fails with a framing
    /// error on an unknown command type or a payload above the ceiling.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Command>> {
        self.buffer.extend_from_slice(data);

        let mut commands = Vec::new();
        while let Some(command) = self.advance()? {
            commands.push(command);
        }
        Ok(commands)
    }

    /// Number of buffered, not-yet-consumed bytes.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn advance(&mut self) -> Result<Option<Command>> {
        loop {
            match self.state {
                State::AwaitHeader => {
                    if self.buffer.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let header = CommandHeader::decode(&self.buffer[..HEADER_SIZE])?;
                    if header.payload_size > self.max_payload_size {
                        return Err(RemoteError::Framing(format!(
                            "payload size {} exceeds maximum {}",
                            header.payload_size, self.max_payload_size
                        )));
                    }

                    let _ = self.buffer.split_to(HEADER_SIZE);
                    self.state = State::AwaitPayload(header);
                }

                State::AwaitPayload(header) => {
                    let needed = header.payload_size as usize;
                    if self.buffer.len() < needed {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(needed).freeze();
                    self.state = State::AwaitHeader;
                    return Ok(Some(Command::new(header, payload)));
                }
            }
        }
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}
