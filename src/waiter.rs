//! Shared wait cell bridging an asynchronous reply to a bounded wait.
//!
//! The caller and the completion registered with the engine each hold a
//! clone; the cell outlives whichever side gives up first. A completion
//! firing after the waiter timed out writes into live shared storage, not
//! into a stack frame that has already gone.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::protocol::{CommandKind, ReplyCallback};

#[derive(Default)]
struct Shared {
    outcome: Mutex<Option<bool>>,
    notify: Notify,
}

/// Waits, with a timeout, for a boolean outcome delivered by a reply
/// completion.
#[derive(Clone, Default)]
pub struct BoolReplyWaiter {
    shared: Arc<Shared>,
}

impl BoolReplyWaiter {
    /// Create a waiter with no outcome yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the outcome and wake waiters. The first delivery wins;
    /// later ones are no-ops.
    pub fn complete(&self, ok: bool) {
        {
            let mut outcome = self.shared.outcome.lock().unwrap();
            if outcome.is_some() {
                return;
            }
            *outcome = Some(ok);
        }
        self.shared.notify.notify_waiters();
    }

    /// The delivered outcome, if any.
    pub fn outcome(&self) -> Option<bool> {
        *self.shared.outcome.lock().unwrap()
    }

    /// Block until the outcome is delivered or `timeout` elapses.
    ///
    /// Returns the delivered boolean, or `false` on timeout.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for the wakeup before checking, so a complete()
            // between the check and the await cannot be missed.
            let notified = self.shared.notify.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.outcome().unwrap_or(false);
            }
        }
    }

    /// A reply completion that stores `true` for a `SUCCESSED` reply and
    /// `false` for anything else, including session loss.
    pub(crate) fn reply_callback(&self) -> ReplyCallback {
        let waiter = self.clone();
        Box::new(move |result| {
            let ok = matches!(result.map(|cmd| cmd.kind()), Ok(CommandKind::Successed));
            waiter.complete(ok);
        })
    }
}
