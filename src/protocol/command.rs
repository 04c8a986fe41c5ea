//! Command value with typed accessors.
//!
//! A [`Command`] is one framed protocol message: a decoded header plus opaque
//! payload bytes. On the sender side a command that awaits a reply also
//! carries its completion, which the engine moves into the pending-reply
//! table when the frame is written. The completion is never serialized.

use bytes::Bytes;

use super::wire_format::{CommandHeader, CommandKind, HEADER_SIZE};
use crate::error::Result;

/// Completion invoked exactly once when the matching reply arrives, or with
/// `ConnectionLost` when the session dies first.
///
/// Runs on the service loop's task, never on the caller's.
pub type ReplyCallback = Box<dyn FnOnce(Result<Command>) + Send + 'static>;

/// One framed protocol message, request or reply.
pub struct Command {
    /// Decoded header.
    header: CommandHeader,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    payload: Bytes,
    /// Completion for the reply this command awaits, sender side only.
    completion: Option<ReplyCallback>,
}

impl Command {
    /// Create a command that expects no reply.
    pub fn new(header: CommandHeader, payload: Bytes) -> Self {
        Self {
            header,
            payload,
            completion: None,
        }
    }

    /// Create a command awaiting a reply.
    pub(crate) fn with_completion(
        header: CommandHeader,
        payload: Bytes,
        completion: ReplyCallback,
    ) -> Self {
        Self {
            header,
            payload,
            completion: Some(completion),
        }
    }

    /// Command kind.
    #[inline]
    pub fn kind(&self) -> CommandKind {
        self.header.kind
    }

    /// Context id carried in the header.
    #[inline]
    pub fn ctx_id(&self) -> i32 {
        self.header.ctx_id
    }

    /// Correlation id; 0 for notifications.
    #[inline]
    pub fn command_id(&self) -> u32 {
        self.header.command_id
    }

    /// The full header.
    #[inline]
    pub fn header(&self) -> &CommandHeader {
        &self.header
    }

    /// Payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Cheap clone of the payload.
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Whether this command still awaits its reply.
    #[inline]
    pub fn is_awaiting_reply(&self) -> bool {
        self.completion.is_some()
    }

    /// Take the completion, leaving the command no longer awaiting.
    ///
    /// Returns `None` on second and later calls, so the completion can only
    /// ever fire once.
    pub(crate) fn take_completion(&mut self) -> Option<ReplyCallback> {
        self.completion.take()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("kind", &self.header.kind.name())
            .field("ctx_id", &self.header.ctx_id)
            .field("command_id", &self.header.command_id)
            .field("payload_len", &self.payload.len())
            .field("awaiting_reply", &self.completion.is_some())
            .finish()
    }
}

/// Build a complete frame as a single byte vector.
pub fn build_frame(header: &CommandHeader, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_accessors() {
        let header = CommandHeader::new(CommandKind::Eval, 3, 42, 5);
        let cmd = Command::new(header, Bytes::from_static(b"hello"));

        assert_eq!(cmd.kind(), CommandKind::Eval);
        assert_eq!(cmd.ctx_id(), 3);
        assert_eq!(cmd.command_id(), 42);
        assert_eq!(cmd.payload(), b"hello");
        assert!(!cmd.is_awaiting_reply());
    }

    #[test]
    fn test_completion_fires_at_most_once() {
        let header = CommandHeader::new(CommandKind::Eval, 0, 1, 0);
        let mut cmd = Command::with_completion(header, Bytes::new(), Box::new(|_| {}));

        assert!(cmd.is_awaiting_reply());
        assert!(cmd.take_completion().is_some());
        assert!(!cmd.is_awaiting_reply());
        assert!(cmd.take_completion().is_none());
    }

    #[test]
    fn test_build_frame_layout() {
        let header = CommandHeader::new(CommandKind::ValueString, 1, 9, 5);
        let bytes = build_frame(&header, b"hello");

        assert_eq!(bytes.len(), HEADER_SIZE + 5);
        let parsed = CommandHeader::decode(&bytes[..HEADER_SIZE]).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&bytes[HEADER_SIZE..], b"hello");
    }

    #[test]
    fn test_build_frame_empty_payload() {
        let header = CommandHeader::new(CommandKind::Break, 1, 0, 0);
        assert_eq!(build_frame(&header, b"").len(), HEADER_SIZE);
    }
}
