//! Wire format encoding and decoding.
//!
//! Implements the 16-byte header format:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │ Type     │ CtxId    │ CmdId    │ Size     │
//! │ 4 bytes  │ 4 bytes  │ 4 bytes  │ 4 bytes  │
//! │ i32 BE   │ i32 BE   │ u32 BE   │ u32 BE   │
//! └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! All integer fields are Big Endian. No payload interpretation happens at
//! this layer.

use crate::error::{RemoteError, Result};

/// Header size in bytes (fixed, exactly 16).
pub const HEADER_SIZE: usize = 16;

/// Default maximum payload size (1 GiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Context id value before the handshake has assigned one.
pub const UNSET_CTX_ID: i32 = -1;

/// Command id carried by notifications that expect no reply.
///
/// Request ids are drawn from a counter starting at 1, so 0 never matches a
/// pending-reply entry.
pub const NOTIFICATION_COMMAND_ID: u32 = 0;

/// Kind of a protocol command.
///
/// Discriminants are the wire values; the order is fixed by the protocol and
/// must never be rearranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandKind {
    /// Positive boolean reply.
    Successed = 0,
    /// Negative boolean reply.
    Failed = 1,
    /// Handshake opener, carries the context id in the header.
    StartConnection = 2,
    /// Session end, sent by either side or synthesized locally on loss.
    EndConnection = 3,
    /// Debuggee run-state changed (running vs. stopped at a break).
    ChangedState = 4,
    /// A known source changed.
    UpdateSource = 5,
    /// Ask the peer to resend sources unconditionally.
    ForceUpdateSource = 6,
    /// A new source was loaded on the context side.
    AddedSource = 7,
    /// Persist edited source text on the context side.
    SaveSource = 8,
    /// Source update counter sync.
    SetUpdateCount = 9,
    /// Set one breakpoint.
    SetBreakpoint = 10,
    /// Remove one breakpoint.
    RemoveBreakpoint = 11,
    /// Full breakpoint-list sync.
    ChangedBreakpointList = 12,
    /// Run control: break as soon as possible.
    Break = 13,
    /// Run control: resume execution.
    Resume = 14,
    /// Run control: step into.
    StepInto = 15,
    /// Run control: step over.
    StepOver = 16,
    /// Run control: step out of the current function.
    StepReturn = 17,
    /// A log record produced by the debuggee.
    OutputLog = 18,
    /// Evaluate an expression in a stack frame; replied with `ValueString`.
    Eval = 19,
    /// Request the fields of a variable; replied with `ValueVarList`.
    RequestFieldsVarList = 20,
    /// Request locals of a stack frame; replied with `ValueVarList`.
    RequestLocalVarList = 21,
    /// Request globals; replied with `ValueVarList`.
    RequestGlobalVarList = 22,
    /// Request registry contents; replied with `ValueVarList`.
    RequestRegistryVarList = 23,
    /// Request the environment of a stack frame; replied with `ValueVarList`.
    RequestEnvironVarList = 24,
    /// Evaluate several expressions as variables; replied with `ValueVarList`.
    RequestEvalVarList = 25,
    /// Request the value stack; replied with `ValueVarList`.
    RequestStackList = 26,
    /// Request the call stack; replied with `ValueBacktraceList`.
    RequestBacktrace = 27,
    /// Reply carrying one string.
    ValueString = 28,
    /// Reply carrying an ordered variable list.
    ValueVarList = 29,
    /// Reply carrying a backtrace snapshot, innermost frame first.
    ValueBacktraceList = 30,
    /// Reply carrying a breakpoint list.
    ValueBreakpointList = 31,
}

impl CommandKind {
    /// Decode a wire discriminant.
    pub fn from_wire(value: i32) -> Option<Self> {
        use CommandKind::*;
        Some(match value {
            0 => Successed,
            1 => Failed,
            2 => StartConnection,
            3 => EndConnection,
            4 => ChangedState,
            5 => UpdateSource,
            6 => ForceUpdateSource,
            7 => AddedSource,
            8 => SaveSource,
            9 => SetUpdateCount,
            10 => SetBreakpoint,
            11 => RemoveBreakpoint,
            12 => ChangedBreakpointList,
            13 => Break,
            14 => Resume,
            15 => StepInto,
            16 => StepOver,
            17 => StepReturn,
            18 => OutputLog,
            19 => Eval,
            20 => RequestFieldsVarList,
            21 => RequestLocalVarList,
            22 => RequestGlobalVarList,
            23 => RequestRegistryVarList,
            24 => RequestEnvironVarList,
            25 => RequestEvalVarList,
            26 => RequestStackList,
            27 => RequestBacktrace,
            28 => ValueString,
            29 => ValueVarList,
            30 => ValueBacktraceList,
            31 => ValueBreakpointList,
            _ => return None,
        })
    }

    /// Wire discriminant of this kind.
    #[inline]
    pub fn to_wire(self) -> i32 {
        self as i32
    }

    /// Wire-level name, used in diagnostics and decode errors.
    pub fn name(self) -> &'static str {
        use CommandKind::*;
        match self {
            Successed => "SUCCESSED",
            Failed => "FAILED",
            StartConnection => "START_CONNECTION",
            EndConnection => "END_CONNECTION",
            ChangedState => "CHANGED_STATE",
            UpdateSource => "UPDATE_SOURCE",
            ForceUpdateSource => "FORCE_UPDATE_SOURCE",
            AddedSource => "ADDED_SOURCE",
            SaveSource => "SAVE_SOURCE",
            SetUpdateCount => "SET_UPDATE_COUNT",
            SetBreakpoint => "SET_BREAKPOINT",
            RemoveBreakpoint => "REMOVE_BREAKPOINT",
            ChangedBreakpointList => "CHANGED_BREAKPOINT_LIST",
            Break => "BREAK",
            Resume => "RESUME",
            StepInto => "STEP_INTO",
            StepOver => "STEP_OVER",
            StepReturn => "STEP_RETURN",
            OutputLog => "OUTPUT_LOG",
            Eval => "EVAL",
            RequestFieldsVarList => "REQUEST_FIELDS_VARLIST",
            RequestLocalVarList => "REQUEST_LOCAL_VARLIST",
            RequestGlobalVarList => "REQUEST_GLOBAL_VARLIST",
            RequestRegistryVarList => "REQUEST_REGISTRY_VARLIST",
            RequestEnvironVarList => "REQUEST_ENVIRON_VARLIST",
            RequestEvalVarList => "REQUEST_EVAL_VARLIST",
            RequestStackList => "REQUEST_STACKLIST",
            RequestBacktrace => "REQUEST_BACKTRACE",
            ValueString => "VALUE_STRING",
            ValueVarList => "VALUE_VARLIST",
            ValueBacktraceList => "VALUE_BACKTRACELIST",
            ValueBreakpointList => "VALUE_BREAKPOINTLIST",
        }
    }

    /// Whether this kind only ever travels as a reply to a request.
    #[inline]
    pub fn is_reply(self) -> bool {
        use CommandKind::*;
        matches!(
            self,
            Successed | Failed | ValueString | ValueVarList | ValueBacktraceList
                | ValueBreakpointList
        )
    }
}

/// Decoded command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Command kind.
    pub kind: CommandKind,
    /// Debuggee session this command belongs to; [`UNSET_CTX_ID`] before the
    /// handshake.
    pub ctx_id: i32,
    /// Sender-assigned correlation id; 0 for notifications.
    pub command_id: u32,
    /// Byte length of the payload that follows the header.
    pub payload_size: u32,
}

impl CommandHeader {
    /// Create a new header.
    pub fn new(kind: CommandKind, ctx_id: i32, command_id: u32, payload_size: u32) -> Self {
        Self {
            kind,
            ctx_id,
            command_id,
            payload_size,
        }
    }

    /// Encode the header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.kind.to_wire().to_be_bytes());
        buf[4..8].copy_from_slice(&self.ctx_id.to_be_bytes());
        buf[8..12].copy_from_slice(&self.command_id.to_be_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_be_bytes());
        buf
    }

    /// Decode a header from bytes (Big Endian).
    ///
    /// Fails with a framing error on a short buffer or an unknown command
    /// type.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RemoteError::Framing(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                buf.len()
            )));
        }

        let raw_kind = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let kind = CommandKind::from_wire(raw_kind)
            .ok_or_else(|| RemoteError::Framing(format!("unknown command type {raw_kind}")))?;

        Ok(Self {
            kind,
            ctx_id: i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            command_id: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            payload_size: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = CommandHeader::new(CommandKind::Eval, 7, 42, 100);
        let encoded = original.encode();
        let decoded = CommandHeader::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = CommandHeader::new(CommandKind::StartConnection, 0x0102_0304, 0x0506_0708, 0x090A_0B0C);
        let bytes = header.encode();

        // Type: StartConnection = 2
        assert_eq!(&bytes[0..4], &[0, 0, 0, 2]);
        // CtxId
        assert_eq!(&bytes[4..8], &[0x01, 0x02, 0x03, 0x04]);
        // CommandId
        assert_eq!(&bytes[8..12], &[0x05, 0x06, 0x07, 0x08]);
        // PayloadSize
        assert_eq!(&bytes[12..16], &[0x09, 0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_header_size_is_exactly_16() {
        assert_eq!(HEADER_SIZE, 16);
        let header = CommandHeader::new(CommandKind::Break, -1, 0, 0);
        assert_eq!(header.encode().len(), 16);
    }

    #[test]
    fn test_negative_ctx_id_roundtrip() {
        let header = CommandHeader::new(CommandKind::StartConnection, UNSET_CTX_ID, 1, 0);
        let decoded = CommandHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.ctx_id, -1);
    }

    #[test]
    fn test_decode_short_buffer_is_framing_error() {
        let buf = [0u8; HEADER_SIZE - 1];
        let err = CommandHeader::decode(&buf).unwrap_err();
        assert!(matches!(err, RemoteError::Framing(_)));
    }

    #[test]
    fn test_decode_unknown_kind_is_framing_error() {
        let mut buf = CommandHeader::new(CommandKind::Successed, 0, 0, 0).encode();
        buf[0..4].copy_from_slice(&99i32.to_be_bytes());

        let err = CommandHeader::decode(&buf).unwrap_err();
        assert!(matches!(err, RemoteError::Framing(_)));
        assert!(err.to_string().contains("unknown command type 99"));
    }

    #[test]
    fn test_all_kinds_roundtrip_through_wire() {
        for raw in 0..32 {
            let kind = CommandKind::from_wire(raw).unwrap();
            assert_eq!(kind.to_wire(), raw);
        }
        assert!(CommandKind::from_wire(32).is_none());
        assert!(CommandKind::from_wire(-1).is_none());
    }

    #[test]
    fn test_reply_kind_classification() {
        assert!(CommandKind::Successed.is_reply());
        assert!(CommandKind::Failed.is_reply());
        assert!(CommandKind::ValueVarList.is_reply());
        assert!(!CommandKind::Eval.is_reply());
        assert!(!CommandKind::StartConnection.is_reply());
        assert!(!CommandKind::Break.is_reply());
    }
}
