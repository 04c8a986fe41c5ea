//! Pending-reply correlation table.
//!
//! Maps the command id of an outstanding request to the completion that must
//! fire when its reply arrives. Owned by the engine, mutated under lock;
//! completions always run outside the lock so they may re-enter the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{RemoteError, Result};
use crate::protocol::{Command, CommandHeader, ReplyCallback};

struct PendingEntry {
    /// Header of the originating request, kept for diagnostics.
    header: CommandHeader,
    callback: ReplyCallback,
}

/// Table of requests still awaiting their reply.
#[derive(Default)]
pub struct PendingReplies {
    entries: Mutex<HashMap<u32, PendingEntry>>,
}

impl PendingReplies {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the completion for the request described by `header`.
    ///
    /// The command-id counter is monotonic, so a duplicate id is a
    /// programming error, not a runtime condition.
    pub fn register(&self, header: CommandHeader, callback: ReplyCallback) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&header.command_id) {
            return Err(RemoteError::DuplicateCommandId(header.command_id));
        }
        entries.insert(header.command_id, PendingEntry { header, callback });
        Ok(())
    }

    /// Resolve the entry matching `command`'s id, if any.
    ///
    /// On a match the stored completion is invoked with the command and
    /// `None` is returned. With no matching entry the command is handed
    /// back untouched; an unsolicited or late reply never disturbs other
    /// pending entries.
    pub fn resolve(&self, command: Command) -> Option<Command> {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            entries.remove(&command.command_id())
        };

        match entry {
            Some(entry) => {
                tracing::debug!(
                    command_id = command.command_id(),
                    request = entry.header.kind.name(),
                    reply = command.kind().name(),
                    "resolving pending reply"
                );
                (entry.callback)(Ok(command));
                None
            }
            None => Some(command),
        }
    }

    /// Remove one entry and invoke its completion with `reason`.
    ///
    /// Used when a request was registered but its frame could not be
    /// written; the failure still travels through the callback channel.
    pub fn fail(&self, command_id: u32, reason: RemoteError) {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            entries.remove(&command_id)
        };
        if let Some(entry) = entry {
            (entry.callback)(Err(reason));
        }
    }

    /// Remove every entry and invoke each completion with a failure built
    /// by `reason`. Used on session loss; afterwards the table is empty.
    pub fn drain_all(&self, reason: impl Fn() -> RemoteError) {
        let drained: Vec<PendingEntry> = {
            let mut entries = self.entries.lock().unwrap();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "draining pending replies");
        }
        for entry in drained {
            (entry.callback)(Err(reason()));
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CommandKind;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn header(kind: CommandKind, command_id: u32) -> CommandHeader {
        CommandHeader::new(kind, 1, command_id, 0)
    }

    fn reply(kind: CommandKind, command_id: u32) -> Command {
        Command::new(header(kind, command_id), Bytes::new())
    }

    #[test]
    fn test_register_then_resolve_fires_once() {
        let table = PendingReplies::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired2 = fired.clone();
        table
            .register(
                header(CommandKind::Eval, 7),
                Box::new(move |result| {
                    assert_eq!(result.unwrap().kind(), CommandKind::ValueString);
                    fired2.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(table.len(), 1);

        assert!(table.resolve(reply(CommandKind::ValueString, 7)).is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());

        // A second reply with the same id no longer matches anything.
        assert!(table.resolve(reply(CommandKind::ValueString, 7)).is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_unknown_id_is_noop() {
        let table = PendingReplies::new();
        table
            .register(header(CommandKind::RequestBacktrace, 3), Box::new(|_| {}))
            .unwrap();

        let unmatched = table.resolve(reply(CommandKind::Successed, 99));
        assert!(unmatched.is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let table = PendingReplies::new();
        table
            .register(header(CommandKind::Eval, 5), Box::new(|_| {}))
            .unwrap();

        let err = table
            .register(header(CommandKind::Eval, 5), Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, RemoteError::DuplicateCommandId(5)));
    }

    #[test]
    fn test_drain_all_fails_every_entry_exactly_once() {
        let table = PendingReplies::new();
        let failures = Arc::new(AtomicUsize::new(0));

        for id in 1..=4 {
            let failures = failures.clone();
            table
                .register(
                    header(CommandKind::RequestGlobalVarList, id),
                    Box::new(move |result| {
                        assert!(matches!(result, Err(RemoteError::ConnectionLost)));
                        failures.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap();
        }

        table.drain_all(|| RemoteError::ConnectionLost);

        assert_eq!(failures.load(Ordering::SeqCst), 4);
        assert!(table.is_empty());

        // Draining an empty table is harmless.
        table.drain_all(|| RemoteError::ConnectionLost);
        assert_eq!(failures.load(Ordering::SeqCst), 4);
    }
}
