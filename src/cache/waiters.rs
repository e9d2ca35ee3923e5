//! Callers parked on a key that another caller is computing.
//!
//! Every waiter owns a one-shot channel. Notifying a key drains its list, so
//! each waiter is resolved exactly once and nothing stays registered.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::logging::trace;
use crate::value::Value;

/// What a waiter receives when the computation it waits on finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Computed(Value),
    Failed(String),
}

/// Pending waiters, per key, in registration order.
#[derive(Debug, Default)]
pub struct Waiters {
    pending: HashMap<String, Vec<oneshot::Sender<WaitOutcome>>>,
}

impl Waiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `key`.
    pub fn wait(&mut self, key: &str) -> oneshot::Receiver<WaitOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.entry(key.to_string()).or_default().push(tx);
        rx
    }

    /// Resolve every waiter on `key` with `value`. Returns the number notified.
    pub fn notify_computed(&mut self, key: &str, value: &Value) -> usize {
        self.notify(key, WaitOutcome::Computed(value.clone()))
    }

    /// Fail every waiter on `key` with `message`. Returns the number notified.
    pub fn notify_error(&mut self, key: &str, message: &str) -> usize {
        self.notify(key, WaitOutcome::Failed(message.to_string()))
    }

    /// Fail all waiters on all keys.
    pub fn fail_all(&mut self, message: &str) -> usize {
        let keys: Vec<String> = self.pending.keys().cloned().collect();
        keys.iter().map(|key| self.notify_error(key, message)).sum()
    }

    /// Number of waiters registered on `key`.
    pub fn pending(&self, key: &str) -> usize {
        self.pending.get(key).map_or(0, Vec::len)
    }

    fn notify(&mut self, key: &str, outcome: WaitOutcome) -> usize {
        let Some(senders) = self.pending.remove(key) else {
            return 0;
        };
        let count = senders.len();
        trace!(key = %key, waiters = senders.len(), "releasing waiters");
        for tx in senders {
            // A waiter that went away does not affect the others.
            let _ = tx.send(outcome.clone());
        }
        count
    }
}
