//! Protocol module - wire format, framing, and command values.
//!
//! This module implements the framed binary protocol:
//! - 16-byte header encoding/decoding
//! - command buffer for accumulating partial reads
//! - command value with typed accessors
//! - typed payload bodies per command kind

mod command;
mod frame_buffer;
pub mod payload;
mod wire_format;

pub use command::{build_frame, Command, ReplyCallback};
pub use frame_buffer::CommandBuffer;
pub use wire_format::{
    CommandHeader, CommandKind, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, NOTIFICATION_COMMAND_ID,
    UNSET_CTX_ID,
};
