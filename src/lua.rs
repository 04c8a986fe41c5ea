//! Snapshot value types describing remote interpreter state.
//!
//! Everything here is a plain serializable value copied into and out of
//! command payloads. The engine never interprets these beyond equality;
//! in particular a [`LuaHandle`] is an identity token, not a pointer the
//! receiving process may dereference.

use serde::{Deserialize, Serialize};

/// Opaque identity of a remote `lua_State`.
///
/// Only the owning process may map it back to a live interpreter; the peer
/// uses it solely to name which interpreter a later command refers to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LuaHandle(u64);

impl LuaHandle {
    /// Wrap a raw interpreter identity.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identity value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Root table a variable was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarRoot {
    /// Global table.
    Global,
    /// Locals of a stack frame; `LuaVar::level` is meaningful only here.
    Local,
    /// Lua registry.
    Registry,
    /// Environment table.
    Environ,
    /// Value stack.
    Stack,
}

/// Locals/environment at call depth `level` of one interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuaStackFrame {
    /// Interpreter this frame belongs to.
    pub lua: LuaHandle,
    /// Call depth, 0 = innermost.
    pub level: i32,
}

impl LuaStackFrame {
    /// Create a stack frame key.
    pub fn new(lua: LuaHandle, level: i32) -> Self {
        Self { lua, level }
    }
}

/// Snapshot of one inspected variable or table field.
///
/// A chain of `parent` links forms the path from a root table down to this
/// field. The chain is acyclic by construction: a child is only ever built
/// from an already-constructed parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuaVar {
    /// Owning interpreter.
    pub lua: LuaHandle,
    /// Root table kind.
    pub root: VarRoot,
    /// Stack frame level, valid only for `VarRoot::Local`.
    pub level: i32,
    /// Parent field on the path from the root, if any.
    pub parent: Option<Box<LuaVar>>,
    /// Variable name or table key.
    pub name: String,
    /// Stringified value at snapshot time.
    pub value: String,
    /// Value-type tag of the remote value.
    pub value_type: i32,
    /// Whether the value has nested fields of its own.
    pub has_fields: bool,
}

impl LuaVar {
    /// Create a root variable (no parent).
    pub fn root(lua: LuaHandle, root: VarRoot, level: i32, name: &str) -> Self {
        Self {
            lua,
            root,
            level,
            parent: None,
            name: name.to_string(),
            value: String::new(),
            value_type: 0,
            has_fields: false,
        }
    }

    /// Create a field of `parent` named `name`.
    pub fn field(parent: LuaVar, name: &str) -> Self {
        Self {
            lua: parent.lua,
            root: parent.root,
            level: parent.level,
            name: name.to_string(),
            value: String::new(),
            value_type: 0,
            has_fields: false,
            parent: Some(Box::new(parent)),
        }
    }

    /// Set the stringified value and type tag.
    pub fn with_value(mut self, value: &str, value_type: i32) -> Self {
        self.value = value.to_string();
        self.value_type = value_type;
        self
    }

    /// Mark the variable as having nested fields.
    pub fn with_fields(mut self, has_fields: bool) -> Self {
        self.has_fields = has_fields;
        self
    }
}

/// Two vars are the same *variable* independent of their snapshot value:
/// equal interpreter and name, plus either equal parent chains or, for
/// parent-less roots, equal root kind and level.
impl PartialEq for LuaVar {
    fn eq(&self, other: &Self) -> bool {
        if self.parent.is_some() != other.parent.is_some() {
            return false;
        }
        if self.lua != other.lua || self.name != other.name {
            return false;
        }
        match (&self.parent, &other.parent) {
            (None, None) => self.root == other.root && self.level == other.level,
            (Some(a), Some(b)) => a == b,
            _ => unreachable!(),
        }
    }
}

impl Eq for LuaVar {}

/// One call-stack entry of a backtrace snapshot.
///
/// Lists of these are ordered innermost-first: the entry at index 0 has
/// `level == 0` and is the frame currently executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuaBacktrace {
    /// Interpreter the call was made in.
    pub lua: LuaHandle,
    /// Name of the called function.
    pub func_name: String,
    /// Identifier of the source the call site lives in.
    pub key: String,
    /// Human-readable title of that source.
    pub source_title: String,
    /// Line of the call site.
    pub line: i32,
    /// Stack level, 0 = innermost.
    pub level: i32,
}

/// A breakpoint position. Transported opaquely; the engine neither
/// interprets nor mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Source identifier.
    pub key: String,
    /// Line the breakpoint is set on.
    pub line: i32,
}

/// A script source known to the debugger. Transported opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier used by breakpoints and backtraces.
    pub key: String,
    /// Display title.
    pub title: String,
    /// Path on the context side, if the source came from a file.
    pub path: String,
    /// Source text, one entry per line.
    pub lines: Vec<String>,
}

/// Severity of a remote log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    /// Ordinary output.
    Message,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Internal trace output.
    Trace,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_x(value: &str) -> LuaVar {
        LuaVar::root(LuaHandle::from_raw(0x10), VarRoot::Global, -1, "x").with_value(value, 4)
    }

    #[test]
    fn test_handle_identity() {
        let a = LuaHandle::from_raw(0xdead_beef);
        let b = LuaHandle::from_raw(0xdead_beef);
        let c = LuaHandle::from_raw(1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(c < a);
        assert_eq!(a.raw(), 0xdead_beef);
    }

    #[test]
    fn test_var_equality_ignores_value() {
        // Same global `x` snapshotted twice with different values.
        let v1 = global_x("1");
        let v2 = global_x("2");
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_var_equality_requires_same_root() {
        let lua = LuaHandle::from_raw(7);
        let global = LuaVar::root(lua, VarRoot::Global, -1, "x");
        let local = LuaVar::root(lua, VarRoot::Local, 0, "x");
        assert_ne!(global, local);

        let level0 = LuaVar::root(lua, VarRoot::Local, 0, "x");
        let level1 = LuaVar::root(lua, VarRoot::Local, 1, "x");
        assert_ne!(level0, level1);
    }

    #[test]
    fn test_var_equality_requires_same_interpreter() {
        let a = LuaVar::root(LuaHandle::from_raw(1), VarRoot::Global, -1, "x");
        let b = LuaVar::root(LuaHandle::from_raw(2), VarRoot::Global, -1, "x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_var_equality_compares_parent_chains() {
        let lua = LuaHandle::from_raw(3);
        let table = LuaVar::root(lua, VarRoot::Global, -1, "t").with_fields(true);

        let f1 = LuaVar::field(table.clone(), "field").with_value("1", 3);
        let f2 = LuaVar::field(table.clone(), "field").with_value("2", 3);
        assert_eq!(f1, f2);

        // Same field name under a different root table.
        let other = LuaVar::root(lua, VarRoot::Global, -1, "u").with_fields(true);
        let f3 = LuaVar::field(other, "field");
        assert_ne!(f1, f3);

        // A root is never equal to a field, even with matching names.
        let root_named_field = LuaVar::root(lua, VarRoot::Global, -1, "field");
        assert_ne!(f1, root_named_field);
    }

    #[test]
    fn test_nested_field_path() {
        let lua = LuaHandle::from_raw(9);
        let t = LuaVar::root(lua, VarRoot::Global, -1, "t").with_fields(true);
        let inner = LuaVar::field(t, "inner").with_fields(true);
        let leaf = LuaVar::field(inner, "leaf").with_value("42", 3);

        assert_eq!(leaf.name, "leaf");
        assert_eq!(leaf.parent.as_ref().unwrap().name, "inner");
        assert_eq!(
            leaf.parent.as_ref().unwrap().parent.as_ref().unwrap().name,
            "t"
        );
    }
}
