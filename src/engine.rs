//! Remote engine facade.
//!
//! One engine instance is one endpoint of the debugger protocol, started
//! either as the debuggee context (listener) or the debugger frame
//! (connector). After bring-up both roles expose the same surface: the
//! protocol operation catalog, reply correlation, and response emission.
//!
//! A dedicated service loop owns the socket's read half and drives all
//! inbound dispatch; reply completions and the generic command handler run
//! on that task, never on the caller's.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{RemoteError, Result};
use crate::lua::{Breakpoint, LogType, LuaBacktrace, LuaStackFrame, LuaVar, Source};
use crate::pending::PendingReplies;
use crate::protocol::payload::{self, Payload};
use crate::protocol::{
    Command, CommandBuffer, CommandHeader, CommandKind, ReplyCallback, NOTIFICATION_COMMAND_ID,
    UNSET_CTX_ID,
};
use crate::transport;
use crate::waiter::BoolReplyWaiter;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Connection lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session. The engine can be started.
    Disconnected,
    /// Transport is up or being brought up, handshake not finished.
    Connecting,
    /// Handshake completed; the operation catalog is live.
    Connected,
}

/// Generic inbound-command handler.
///
/// Receives every non-reply command the peer sends, plus exactly one
/// `END_CONNECTION` command when the session ends for any reason.
pub type CommandHandler = Arc<dyn Fn(Command) + Send + Sync + 'static>;

struct SessionHandle {
    writer: WriterHandle,
    read_task: JoinHandle<()>,
    _writer_task: JoinHandle<Result<()>>,
}

struct ConnShared {
    ctx_id: i32,
    session: Option<SessionHandle>,
}

struct EngineInner {
    pending: PendingReplies,
    command_counter: AtomicU32,
    conn: Mutex<ConnShared>,
    state_tx: watch::Sender<ConnectionState>,
    handler: Mutex<Option<CommandHandler>>,
}

/// The command protocol engine.
///
/// Cheaply cloneable; clones share one endpoint. All methods are safe to
/// call from any task concurrently with the service loop.
#[derive(Clone)]
pub struct RemoteEngine {
    inner: Arc<EngineInner>,
}

impl Default for RemoteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteEngine {
    /// Create a disconnected engine.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(EngineInner {
                pending: PendingReplies::new(),
                // 0 is reserved for notifications.
                command_counter: AtomicU32::new(1),
                conn: Mutex::new(ConnShared {
                    ctx_id: UNSET_CTX_ID,
                    session: None,
                }),
                state_tx,
                handler: Mutex::new(None),
            }),
        }
    }

    /// Install the generic inbound-command handler.
    ///
    /// The handler runs on the service loop's task. It is the single
    /// notification point for "connection ended".
    pub fn set_command_handler(&self, handler: impl Fn(Command) + Send + Sync + 'static) {
        *self.inner.handler.lock().unwrap() = Some(Arc::new(handler));
    }

    /// Whether the handshake has completed and the session is live.
    pub fn is_connected(&self) -> bool {
        *self.inner.state_tx.borrow() == ConnectionState::Connected
    }

    /// Current lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Context id of the session, [`UNSET_CTX_ID`] before the handshake.
    pub fn ctx_id(&self) -> i32 {
        self.inner.conn.lock().unwrap().ctx_id
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start as the debuggee context: listen on `port`, accept one peer and
    /// run the handshake, each bounded by `wait`.
    ///
    /// On success the peer has acknowledged `START_CONNECTION` and
    /// [`is_connected`](Self::is_connected) is true.
    pub async fn start_context(&self, port: u16, ctx_id: i32, wait: Duration) -> Result<()> {
        self.begin_connecting()?;

        let stream = match transport::accept_one(port, wait).await {
            Ok(stream) => stream,
            Err(e) => {
                self.teardown(None);
                return Err(e);
            }
        };
        self.install_session(stream, Some(ctx_id));

        let waiter = BoolReplyWaiter::new();
        if let Err(e) = self.write_request(
            CommandKind::StartConnection,
            Vec::new(),
            waiter.reply_callback(),
        ) {
            self.teardown(None);
            return Err(e);
        }

        if waiter.wait(wait).await {
            if !self.mark_connected() {
                return Err(RemoteError::ConnectionLost);
            }
            tracing::info!(ctx_id, "context session established");
            Ok(())
        } else {
            tracing::warn!(ctx_id, "handshake not acknowledged in time");
            self.teardown(None);
            Err(RemoteError::ConnectionTimeout)
        }
    }

    /// Start as the debugger frame: connect to `host:port` and wait for the
    /// context's `START_CONNECTION`, each bounded by `wait`.
    ///
    /// The connect is retried until the deadline so the two processes may
    /// start in either order.
    pub async fn start_frame(&self, host: &str, port: u16, wait: Duration) -> Result<()> {
        self.begin_connecting()?;

        let stream = match transport::connect_retry(host, port, wait).await {
            Ok(stream) => stream,
            Err(e) => {
                self.teardown(None);
                return Err(e);
            }
        };

        let mut state_rx = self.inner.state_tx.subscribe();
        self.install_session(stream, None);

        // The service loop flips the state when START_CONNECTION arrives.
        let handshake = state_rx.wait_for(|s| *s != ConnectionState::Connecting);
        let outcome = tokio::time::timeout(wait, handshake)
            .await
            .map(|r| r.map(|state| *state));
        match outcome {
            Ok(Ok(state)) if state == ConnectionState::Connected => {
                tracing::info!(ctx_id = self.ctx_id(), "frame session established");
                Ok(())
            }
            Ok(_) => {
                self.teardown(None);
                Err(RemoteError::ConnectionLost)
            }
            Err(_) => {
                tracing::warn!("no START_CONNECTION from context in time");
                self.teardown(None);
                Err(RemoteError::ConnectionTimeout)
            }
        }
    }

    /// End the session: send `END_CONNECTION`, wait up to `wait` for the
    /// peer's acknowledgement, then close regardless.
    pub async fn stop(&self, wait: Duration) -> Result<()> {
        if !self.is_connected() {
            return Err(RemoteError::ProtocolViolation(
                "stop on a disconnected engine".to_string(),
            ));
        }

        let waiter = BoolReplyWaiter::new();
        self.write_request(CommandKind::EndConnection, Vec::new(), waiter.reply_callback())?;
        let acknowledged = waiter.wait(wait).await;
        self.teardown(None);

        if acknowledged {
            Ok(())
        } else {
            Err(RemoteError::ConnectionTimeout)
        }
    }

    // ------------------------------------------------------------------
    // Notifications (no reply expected)
    // ------------------------------------------------------------------

    /// Announce a run-state change of the debuggee.
    pub fn changed_state(&self, is_break: bool) -> Result<()> {
        self.write_notification(
            CommandKind::ChangedState,
            payload::ChangedState { is_break }.encode()?,
        )
    }

    /// Announce that a known source changed.
    pub fn update_source(&self, key: &str, line: i32, update_count: i32) -> Result<()> {
        self.write_notification(
            CommandKind::UpdateSource,
            payload::UpdateSource {
                key: key.to_string(),
                line,
                update_count,
            }
            .encode()?,
        )
    }

    /// Ask the peer to resend all sources.
    pub fn force_update_source(&self) -> Result<()> {
        self.write_notification(CommandKind::ForceUpdateSource, Vec::new())
    }

    /// Announce a newly loaded source.
    pub fn added_source(&self, source: &Source) -> Result<()> {
        self.write_notification(
            CommandKind::AddedSource,
            payload::AddedSource {
                source: source.clone(),
            }
            .encode()?,
        )
    }

    /// Ask the context to persist edited source text.
    pub fn save_source(&self, key: &str, sources: &[String]) -> Result<()> {
        self.write_notification(
            CommandKind::SaveSource,
            payload::SaveSource {
                key: key.to_string(),
                sources: sources.to_vec(),
            }
            .encode()?,
        )
    }

    /// Sync the source update counter.
    pub fn set_update_count(&self, count: i32) -> Result<()> {
        self.write_notification(
            CommandKind::SetUpdateCount,
            payload::SetUpdateCount { count }.encode()?,
        )
    }

    /// Set one breakpoint on the peer.
    pub fn set_breakpoint(&self, breakpoint: &Breakpoint) -> Result<()> {
        self.write_notification(
            CommandKind::SetBreakpoint,
            payload::SetBreakpoint {
                breakpoint: breakpoint.clone(),
            }
            .encode()?,
        )
    }

    /// Remove one breakpoint on the peer.
    pub fn remove_breakpoint(&self, breakpoint: &Breakpoint) -> Result<()> {
        self.write_notification(
            CommandKind::RemoveBreakpoint,
            payload::RemoveBreakpoint {
                breakpoint: breakpoint.clone(),
            }
            .encode()?,
        )
    }

    /// Sync the full breakpoint list.
    pub fn changed_breakpoint_list(&self, breakpoints: &[Breakpoint]) -> Result<()> {
        self.write_notification(
            CommandKind::ChangedBreakpointList,
            payload::ChangedBreakpointList {
                breakpoints: breakpoints.to_vec(),
            }
            .encode()?,
        )
    }

    /// Run control: break as soon as possible.
    pub fn break_now(&self) -> Result<()> {
        self.write_notification(CommandKind::Break, Vec::new())
    }

    /// Run control: resume execution.
    pub fn resume(&self) -> Result<()> {
        self.write_notification(CommandKind::Resume, Vec::new())
    }

    /// Run control: step into.
    pub fn step_into(&self) -> Result<()> {
        self.write_notification(CommandKind::StepInto, Vec::new())
    }

    /// Run control: step over.
    pub fn step_over(&self) -> Result<()> {
        self.write_notification(CommandKind::StepOver, Vec::new())
    }

    /// Run control: step out of the current function.
    pub fn step_return(&self) -> Result<()> {
        self.write_notification(CommandKind::StepReturn, Vec::new())
    }

    /// Forward a debuggee log record.
    pub fn output_log(&self, log_type: LogType, message: &str, key: &str, line: i32) -> Result<()> {
        self.write_notification(
            CommandKind::OutputLog,
            payload::OutputLog {
                log_type,
                message: message.to_string(),
                key: key.to_string(),
                line,
            }
            .encode()?,
        )
    }

    // ------------------------------------------------------------------
    // Requests (reply expected, completion fires on the service loop)
    // ------------------------------------------------------------------

    /// Evaluate an expression in a stack frame; the reply is its
    /// stringified result.
    pub fn eval(
        &self,
        chunk: &str,
        stack_frame: &LuaStackFrame,
        callback: impl FnOnce(Result<String>) + Send + 'static,
    ) -> Result<()> {
        let body = payload::Eval {
            chunk: chunk.to_string(),
            stack_frame: stack_frame.clone(),
        }
        .encode()?;
        self.write_request(
            CommandKind::Eval,
            body,
            Box::new(move |result| callback(result.and_then(decode_string_reply))),
        )
    }

    /// Request the fields of a variable.
    pub fn request_fields_var_list(
        &self,
        var: &LuaVar,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        let body = payload::RequestFieldsVarList { var: var.clone() }.encode()?;
        self.var_list_request(CommandKind::RequestFieldsVarList, body, callback)
    }

    /// Request the locals of a stack frame.
    pub fn request_local_var_list(
        &self,
        stack_frame: &LuaStackFrame,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        let body = payload::RequestLocalVarList {
            stack_frame: stack_frame.clone(),
        }
        .encode()?;
        self.var_list_request(CommandKind::RequestLocalVarList, body, callback)
    }

    /// Request the environment of a stack frame.
    pub fn request_environ_var_list(
        &self,
        stack_frame: &LuaStackFrame,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        let body = payload::RequestLocalVarList {
            stack_frame: stack_frame.clone(),
        }
        .encode()?;
        self.var_list_request(CommandKind::RequestEnvironVarList, body, callback)
    }

    /// Evaluate several expressions as a variable list.
    pub fn request_eval_var_list(
        &self,
        chunks: &[String],
        stack_frame: &LuaStackFrame,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        let body = payload::RequestEvalVarList {
            chunks: chunks.to_vec(),
            stack_frame: stack_frame.clone(),
        }
        .encode()?;
        self.var_list_request(CommandKind::RequestEvalVarList, body, callback)
    }

    /// Request the globals.
    pub fn request_global_var_list(
        &self,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        self.var_list_request(CommandKind::RequestGlobalVarList, Vec::new(), callback)
    }

    /// Request the registry contents.
    pub fn request_registry_var_list(
        &self,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        self.var_list_request(CommandKind::RequestRegistryVarList, Vec::new(), callback)
    }

    /// Request the value stack.
    pub fn request_stack_list(
        &self,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        self.var_list_request(CommandKind::RequestStackList, Vec::new(), callback)
    }

    /// Request the call stack. Entries arrive innermost frame first.
    pub fn request_backtrace(
        &self,
        callback: impl FnOnce(Result<Vec<LuaBacktrace>>) + Send + 'static,
    ) -> Result<()> {
        self.write_request(
            CommandKind::RequestBacktrace,
            Vec::new(),
            Box::new(move |result| callback(result.and_then(decode_backtrace_reply))),
        )
    }

    // ------------------------------------------------------------------
    // Response emission (mirror side of the requests)
    // ------------------------------------------------------------------

    /// Acknowledge `command` positively.
    pub fn response_successed(&self, command: &Command) -> Result<()> {
        self.write_response(command, CommandKind::Successed, Vec::new())
    }

    /// Acknowledge `command` negatively.
    pub fn response_failed(&self, command: &Command) -> Result<()> {
        self.write_response(command, CommandKind::Failed, Vec::new())
    }

    /// Answer `command` with a string value.
    pub fn response_string(&self, command: &Command, value: &str) -> Result<()> {
        self.write_response(
            command,
            CommandKind::ValueString,
            payload::ValueString {
                value: value.to_string(),
            }
            .encode()?,
        )
    }

    /// Answer `command` with a variable list, order preserved.
    pub fn response_var_list(&self, command: &Command, vars: &[LuaVar]) -> Result<()> {
        self.write_response(
            command,
            CommandKind::ValueVarList,
            payload::ValueVarList {
                vars: vars.to_vec(),
            }
            .encode()?,
        )
    }

    /// Answer `command` with a backtrace snapshot, innermost frame first.
    pub fn response_backtrace_list(
        &self,
        command: &Command,
        backtraces: &[LuaBacktrace],
    ) -> Result<()> {
        self.write_response(
            command,
            CommandKind::ValueBacktraceList,
            payload::ValueBacktraceList {
                backtraces: backtraces.to_vec(),
            }
            .encode()?,
        )
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_connecting(&self) -> Result<()> {
        let mut conn = self.inner.conn.lock().unwrap();
        if *self.inner.state_tx.borrow() != ConnectionState::Disconnected {
            return Err(RemoteError::ProtocolViolation(
                "engine is already started".to_string(),
            ));
        }
        self.inner
            .state_tx
            .send_replace(ConnectionState::Connecting);
        conn.ctx_id = UNSET_CTX_ID;
        Ok(())
    }

    fn install_session(&self, stream: TcpStream, ctx_id: Option<i32>) {
        let (read_half, write_half) = stream.into_split();
        let (writer, writer_task) = spawn_writer_task(write_half);
        let read_task = tokio::spawn(Self::service_loop(self.clone(), read_half));

        let mut conn = self.inner.conn.lock().unwrap();
        if let Some(id) = ctx_id {
            conn.ctx_id = id;
        }
        conn.session = Some(SessionHandle {
            writer,
            read_task,
            _writer_task: writer_task,
        });
    }

    /// The dedicated service loop: read, reassemble, dispatch.
    async fn service_loop(engine: RemoteEngine, mut reader: OwnedReadHalf) {
        let mut buffer = CommandBuffer::new();
        let mut chunk = vec![0u8; 16 * 1024];

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    tracing::debug!("peer closed the connection");
                    break;
                }
                Ok(n) => match buffer.push(&chunk[..n]) {
                    Ok(commands) => {
                        for command in commands {
                            engine.dispatch(command);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "framing error, dropping session");
                        break;
                    }
                },
                Err(e) => {
                    tracing::debug!(error = %e, "socket read failed");
                    break;
                }
            }
        }

        engine.teardown(None);
    }

    /// Classify one inbound command: reply path through the pending table,
    /// protocol-internal command, or generic handler.
    fn dispatch(&self, command: Command) {
        // Only reply kinds carry a correlation; a request id assigned by
        // the peer's own counter must never hit our pending table.
        if command.kind().is_reply() {
            if let Some(unmatched) = self.inner.pending.resolve(command) {
                // A reply outside any correlation is meaningless.
                tracing::warn!(
                    kind = unmatched.kind().name(),
                    command_id = unmatched.command_id(),
                    "dropping unsolicited reply"
                );
            }
            return;
        }

        match command.kind() {
            CommandKind::StartConnection => self.handle_start_connection(command),
            CommandKind::EndConnection => {
                tracing::debug!("peer ended the session");
                let _ = self.response_successed(&command);
                self.teardown(Some(command));
            }
            _ => {
                let handler = self.inner.handler.lock().unwrap().clone();
                match handler {
                    Some(handler) => handler(command),
                    None => tracing::warn!(
                        kind = command.kind().name(),
                        "no command handler installed, dropping command"
                    ),
                }
            }
        }
    }

    fn handle_start_connection(&self, command: Command) {
        if self.is_connected() {
            tracing::warn!("START_CONNECTION on an established session");
            let _ = self.response_failed(&command);
            return;
        }

        self.inner.conn.lock().unwrap().ctx_id = command.ctx_id();
        let _ = self.response_successed(&command);
        self.mark_connected();
        tracing::debug!(ctx_id = command.ctx_id(), "adopted context id from peer");
    }

    /// Flip to `Connected`, unless the session died in the meantime.
    fn mark_connected(&self) -> bool {
        let conn = self.inner.conn.lock().unwrap();
        if conn.session.is_some() {
            self.inner.state_tx.send_replace(ConnectionState::Connected);
            true
        } else {
            false
        }
    }

    /// Exactly-once session teardown: drain pending replies, deliver the
    /// end-of-connection notification, release the socket tasks.
    fn teardown(&self, received_end: Option<Command>) {
        let (previous, session, ctx_id) = {
            let mut conn = self.inner.conn.lock().unwrap();
            let previous = self
                .inner
                .state_tx
                .send_replace(ConnectionState::Disconnected);
            (previous, conn.session.take(), conn.ctx_id)
        };

        if previous == ConnectionState::Disconnected {
            return;
        }

        if let Some(session) = session {
            session.read_task.abort();
        }
        self.inner.pending.drain_all(|| RemoteError::ConnectionLost);

        if previous == ConnectionState::Connected {
            let notification = received_end.unwrap_or_else(|| {
                Command::new(
                    CommandHeader::new(
                        CommandKind::EndConnection,
                        ctx_id,
                        NOTIFICATION_COMMAND_ID,
                        0,
                    ),
                    Bytes::new(),
                )
            });
            let handler = self.inner.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                handler(notification);
            }
        }
    }

    fn writer(&self) -> Result<WriterHandle> {
        let conn = self.inner.conn.lock().unwrap();
        conn.session
            .as_ref()
            .map(|s| s.writer.clone())
            .ok_or(RemoteError::ConnectionLost)
    }

    fn next_command_id(&self) -> u32 {
        self.inner.command_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn write_notification(&self, kind: CommandKind, body: Vec<u8>) -> Result<()> {
        let header = CommandHeader::new(
            kind,
            self.ctx_id(),
            NOTIFICATION_COMMAND_ID,
            body.len() as u32,
        );
        self.writer()?
            .send(OutboundFrame::new(&header, Bytes::from(body)))
    }

    /// Register the completion and write the request frame.
    ///
    /// Transport failures after registration are delivered through the
    /// completion as `ConnectionLost`, not returned here.
    fn write_request(&self, kind: CommandKind, body: Vec<u8>, callback: ReplyCallback) -> Result<()> {
        let header = CommandHeader::new(kind, self.ctx_id(), self.next_command_id(), body.len() as u32);
        let mut command = Command::with_completion(header, Bytes::from(body), callback);

        let completion = command
            .take_completion()
            .expect("freshly built request has its completion");
        self.inner.pending.register(header, completion)?;

        let written = self
            .writer()
            .and_then(|w| w.send(OutboundFrame::new(&header, command.payload_bytes())));
        if written.is_err() {
            self.inner
                .pending
                .fail(header.command_id, RemoteError::ConnectionLost);
        }
        Ok(())
    }

    fn write_response(&self, to: &Command, kind: CommandKind, body: Vec<u8>) -> Result<()> {
        // The reply echoes the request's correlation id.
        let header = CommandHeader::new(kind, self.ctx_id(), to.command_id(), body.len() as u32);
        self.writer()?
            .send(OutboundFrame::new(&header, Bytes::from(body)))
    }

    fn var_list_request(
        &self,
        kind: CommandKind,
        body: Vec<u8>,
        callback: impl FnOnce(Result<Vec<LuaVar>>) + Send + 'static,
    ) -> Result<()> {
        self.write_request(
            kind,
            body,
            Box::new(move |result| callback(result.and_then(decode_var_list_reply))),
        )
    }
}

fn decode_string_reply(command: Command) -> Result<String> {
    match command.kind() {
        CommandKind::ValueString => Ok(payload::ValueString::decode(command.payload())?.value),
        CommandKind::Failed => Err(RemoteError::RequestFailed),
        other => Err(RemoteError::ProtocolViolation(format!(
            "expected VALUE_STRING reply, got {}",
            other.name()
        ))),
    }
}

fn decode_var_list_reply(command: Command) -> Result<Vec<LuaVar>> {
    match command.kind() {
        CommandKind::ValueVarList => Ok(payload::ValueVarList::decode(command.payload())?.vars),
        CommandKind::Failed => Err(RemoteError::RequestFailed),
        other => Err(RemoteError::ProtocolViolation(format!(
            "expected VALUE_VARLIST reply, got {}",
            other.name()
        ))),
    }
}

fn decode_backtrace_reply(command: Command) -> Result<Vec<LuaBacktrace>> {
    match command.kind() {
        CommandKind::ValueBacktraceList => {
            Ok(payload::ValueBacktraceList::decode(command.payload())?.backtraces)
        }
        CommandKind::Failed => Err(RemoteError::RequestFailed),
        other => Err(RemoteError::ProtocolViolation(format!(
            "expected VALUE_BACKTRACELIST reply, got {}",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_engine_is_disconnected() {
        let engine = RemoteEngine::new();
        assert!(!engine.is_connected());
        assert_eq!(engine.connection_state(), ConnectionState::Disconnected);
        assert_eq!(engine.ctx_id(), UNSET_CTX_ID);
    }

    #[test]
    fn test_command_ids_are_unique_across_threads() {
        let engine = RemoteEngine::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| engine.next_command_id()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert_ne!(id, NOTIFICATION_COMMAND_ID);
                assert!(seen.insert(id), "command id {id} issued twice");
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn test_notification_without_session_is_connection_lost() {
        let engine = RemoteEngine::new();
        assert!(matches!(
            engine.resume(),
            Err(RemoteError::ConnectionLost)
        ));
        assert!(matches!(
            engine.changed_state(true),
            Err(RemoteError::ConnectionLost)
        ));
    }

    #[test]
    fn test_request_without_session_fails_through_callback() {
        let engine = RemoteEngine::new();
        let (tx, rx) = std::sync::mpsc::channel();

        engine
            .request_global_var_list(move |result| {
                tx.send(result.is_err()).unwrap();
            })
            .unwrap();

        assert!(rx.recv().unwrap());
        assert!(engine.inner.pending.is_empty());
    }

    #[tokio::test]
    async fn test_stop_requires_a_session() {
        let engine = RemoteEngine::new();
        assert!(matches!(
            engine.stop(Duration::from_millis(10)).await,
            Err(RemoteError::ProtocolViolation(_))
        ));
    }
}
