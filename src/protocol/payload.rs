//! Typed payload bodies, one struct per command kind that carries data.
//!
//! The wire layer moves opaque bytes; these structs give each command its
//! logical fields and pair an encoder with a decoder through [`Payload`].
//! Kinds not listed here (handshake, run control, the parameterless
//! requests) travel with an empty payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::MsgPackCodec;
use crate::error::{RemoteError, Result};
use crate::lua::{Breakpoint, LogType, LuaBacktrace, LuaStackFrame, LuaVar, Source};

/// Round-trippable payload body of one command kind.
pub trait Payload: Serialize + DeserializeOwned {
    /// Wire name of the owning command kind, used in decode errors.
    const KIND: &'static str;

    /// Encode to payload bytes.
    fn encode(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }

    /// Decode from payload bytes.
    ///
    /// A payload inconsistent with the declared kind fails with
    /// [`RemoteError::PayloadDecode`], never a silent default.
    fn decode(bytes: &[u8]) -> Result<Self> {
        MsgPackCodec::decode(bytes).map_err(|source| RemoteError::PayloadDecode {
            kind: Self::KIND,
            source,
        })
    }
}

/// Debuggee run-state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedState {
    /// True when the debuggee stopped at a break.
    pub is_break: bool,
}

impl Payload for ChangedState {
    const KIND: &'static str = "CHANGED_STATE";
}

/// Notification that a known source changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSource {
    /// Source identifier.
    pub key: String,
    /// Current line of interest.
    pub line: i32,
    /// Monotonic source update counter.
    pub update_count: i32,
}

impl Payload for UpdateSource {
    const KIND: &'static str = "UPDATE_SOURCE";
}

/// A source newly loaded on the context side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedSource {
    /// The source, carried opaquely.
    pub source: Source,
}

impl Payload for AddedSource {
    const KIND: &'static str = "ADDED_SOURCE";
}

/// Request to persist edited source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSource {
    /// Source identifier.
    pub key: String,
    /// Full replacement text, one entry per line.
    pub sources: Vec<String>,
}

impl Payload for SaveSource {
    const KIND: &'static str = "SAVE_SOURCE";
}

/// Source update counter sync.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetUpdateCount {
    /// New counter value.
    pub count: i32,
}

impl Payload for SetUpdateCount {
    const KIND: &'static str = "SET_UPDATE_COUNT";
}

/// Set one breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBreakpoint {
    /// The breakpoint, carried opaquely.
    pub breakpoint: Breakpoint,
}

impl Payload for SetBreakpoint {
    const KIND: &'static str = "SET_BREAKPOINT";
}

/// Remove one breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveBreakpoint {
    /// The breakpoint, carried opaquely.
    pub breakpoint: Breakpoint,
}

impl Payload for RemoveBreakpoint {
    const KIND: &'static str = "REMOVE_BREAKPOINT";
}

/// Full breakpoint-list sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedBreakpointList {
    /// Current breakpoint list.
    pub breakpoints: Vec<Breakpoint>,
}

impl Payload for ChangedBreakpointList {
    const KIND: &'static str = "CHANGED_BREAKPOINT_LIST";
}

/// A log record produced by the debuggee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLog {
    /// Record severity.
    pub log_type: LogType,
    /// The log text.
    pub message: String,
    /// Source the record points at, empty if none.
    pub key: String,
    /// Line the record points at.
    pub line: i32,
}

impl Payload for OutputLog {
    const KIND: &'static str = "OUTPUT_LOG";
}

/// Evaluate an expression in a stack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eval {
    /// Expression source text.
    pub chunk: String,
    /// Frame to evaluate in.
    pub stack_frame: LuaStackFrame,
}

impl Payload for Eval {
    const KIND: &'static str = "EVAL";
}

/// Request the fields of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFieldsVarList {
    /// Variable whose fields are wanted.
    pub var: LuaVar,
}

impl Payload for RequestFieldsVarList {
    const KIND: &'static str = "REQUEST_FIELDS_VARLIST";
}

/// Request the locals of a stack frame. Shared by the environ request,
/// which carries the same single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLocalVarList {
    /// Frame whose variables are wanted.
    pub stack_frame: LuaStackFrame,
}

impl Payload for RequestLocalVarList {
    const KIND: &'static str = "REQUEST_LOCAL_VARLIST";
}

/// Evaluate several expressions as a variable list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvalVarList {
    /// Expression source texts.
    pub chunks: Vec<String>,
    /// Frame to evaluate in.
    pub stack_frame: LuaStackFrame,
}

impl Payload for RequestEvalVarList {
    const KIND: &'static str = "REQUEST_EVAL_VARLIST";
}

/// Reply carrying one string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueString {
    /// The string value.
    pub value: String,
}

impl Payload for ValueString {
    const KIND: &'static str = "VALUE_STRING";
}

/// Reply carrying an ordered variable list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueVarList {
    /// Variables in the order the responder produced them.
    pub vars: Vec<LuaVar>,
}

impl Payload for ValueVarList {
    const KIND: &'static str = "VALUE_VARLIST";
}

/// Reply carrying a backtrace snapshot, innermost frame first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBacktraceList {
    /// Call-stack entries ordered by ascending level.
    pub backtraces: Vec<LuaBacktrace>,
}

impl Payload for ValueBacktraceList {
    const KIND: &'static str = "VALUE_BACKTRACELIST";
}

/// Reply carrying a breakpoint list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBreakpointList {
    /// The breakpoints.
    pub breakpoints: Vec<Breakpoint>,
}

impl Payload for ValueBreakpointList {
    const KIND: &'static str = "VALUE_BREAKPOINTLIST";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lua::{LuaHandle, VarRoot};

    #[test]
    fn test_eval_roundtrip() {
        let original = Eval {
            chunk: "player.hp + 1".to_string(),
            stack_frame: LuaStackFrame::new(LuaHandle::from_raw(0xABCD), 2),
        };

        let bytes = original.encode().unwrap();
        let decoded = Eval::decode(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_var_list_roundtrip_preserves_order() {
        let lua = LuaHandle::from_raw(1);
        let vars = vec![
            LuaVar::root(lua, VarRoot::Global, -1, "a").with_value("1", 3),
            LuaVar::root(lua, VarRoot::Global, -1, "b").with_value("two", 4),
            LuaVar::root(lua, VarRoot::Global, -1, "c").with_fields(true),
        ];
        let original = ValueVarList { vars };

        let decoded = ValueVarList::decode(&original.encode().unwrap()).unwrap();
        let names: Vec<_> = decoded.vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_nested_var_survives_transport() {
        let lua = LuaHandle::from_raw(2);
        let table = LuaVar::root(lua, VarRoot::Local, 0, "cfg").with_fields(true);
        let field = LuaVar::field(table, "timeout").with_value("30", 3);
        let original = ValueVarList { vars: vec![field] };

        let decoded = ValueVarList::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.vars[0].parent.as_ref().unwrap().name, "cfg");
        assert_eq!(decoded.vars[0], original.vars[0]);
    }

    #[test]
    fn test_backtrace_roundtrip() {
        let original = ValueBacktraceList {
            backtraces: vec![
                LuaBacktrace {
                    lua: LuaHandle::from_raw(5),
                    func_name: "update".to_string(),
                    key: "@game.lua".to_string(),
                    source_title: "game.lua".to_string(),
                    line: 120,
                    level: 0,
                },
                LuaBacktrace {
                    lua: LuaHandle::from_raw(5),
                    func_name: "main".to_string(),
                    key: "@main.lua".to_string(),
                    source_title: "main.lua".to_string(),
                    line: 8,
                    level: 1,
                },
            ],
        };

        let decoded = ValueBacktraceList::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.backtraces[0].level < decoded.backtraces[1].level);
    }

    #[test]
    fn test_decode_mismatch_names_the_kind() {
        // A ChangedState body is not a valid Eval body.
        let bytes = ChangedState { is_break: true }.encode().unwrap();
        let err = Eval::decode(&bytes).unwrap_err();

        match err {
            RemoteError::PayloadDecode { kind, .. } => assert_eq!(kind, "EVAL"),
            other => panic!("expected PayloadDecode, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(OutputLog::decode(b"\xc1\xc1\xc1").is_err());
        assert!(ValueVarList::decode(b"").is_err());
    }
}
