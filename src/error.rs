//! Error types for luadbg-remote.

use thiserror::Error;

/// Main error type for all engine operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame: short header, unknown command type, or a payload
    /// size the stream cannot satisfy.
    #[error("framing error: {0}")]
    Framing(String),

    /// Payload bytes inconsistent with the declared command type.
    #[error("payload decode error for {kind}: {source}")]
    PayloadDecode {
        /// Command type the payload was declared as.
        kind: &'static str,
        #[source]
        source: rmp_serde::decode::Error,
    },

    /// Payload serialization failed.
    #[error("payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),

    /// Accept/connect or handshake exceeded the bounded wait.
    #[error("connection timed out")]
    ConnectionTimeout,

    /// The peer actively refused the connection.
    #[error("connection refused")]
    ConnectionRefused,

    /// Mid-session I/O failure or peer close.
    #[error("connection lost")]
    ConnectionLost,

    /// A command id was registered twice. Internal invariant violation.
    #[error("duplicate command id: {0}")]
    DuplicateCommandId(u32),

    /// A command arrived in a state that forbids it, or a start was issued
    /// on an already-live engine.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The peer answered a request with `FAILED`.
    #[error("request failed on the remote side")]
    RequestFailed,
}

/// Result type alias using RemoteError.
pub type Result<T> = std::result::Result<T, RemoteError>;
