//! # luadbg-remote
//!
//! Transport and command-protocol engine for a remote Lua debugger. One
//! process embeds the scripted runtime (the *context*), the other is the
//! debugger front end (the *frame*); they drive breakpoints, stepping,
//! variable inspection and source sync over a single TCP connection.
//!
//! ## Architecture
//!
//! - **Wire framing**: 16-byte header plus opaque payload bytes
//! - **Payloads**: MessagePack-encoded structs, one per command kind
//! - **Correlation**: request ids matched against a pending-reply table
//! - **Service loop**: one background task reads, reassembles and
//!   dispatches; a second task serializes all writes
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use luadbg_remote::RemoteEngine;
//!
//! #[tokio::main]
//! async fn main() -> luadbg_remote::Result<()> {
//!     let frame = RemoteEngine::new();
//!     frame.set_command_handler(|cmd| println!("inbound: {cmd:?}"));
//!     frame.start_frame("127.0.0.1", 51000, Duration::from_secs(10)).await?;
//!
//!     frame.request_global_var_list(|vars| {
//!         println!("globals: {:?}", vars);
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod lua;
pub mod protocol;

mod engine;
mod pending;
mod transport;
mod waiter;
mod writer;

pub use engine::{CommandHandler, ConnectionState, RemoteEngine};
pub use error::{RemoteError, Result};
pub use lua::{
    Breakpoint, LogType, LuaBacktrace, LuaHandle, LuaStackFrame, LuaVar, Source, VarRoot,
};
pub use pending::PendingReplies;
pub use protocol::{Command, CommandHeader, CommandKind};
pub use waiter::BoolReplyWaiter;
