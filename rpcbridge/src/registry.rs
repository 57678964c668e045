//! Pending call registry - maps return ids to one-shot reply slots.
//!
//! Removal is owned by the dispatcher: the resolver signals a slot in place
//! through `peek`, and the waiting call removes its own entry once it has
//! consumed (or given up on) the reply. A second reply for the same id finds
//! the slot already spent.
//!
//! `cancel_all` closes the registry for good: later registrations fail with
//! `Shutdown`, so no call can start waiting after teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use tokio::sync::oneshot;

use crate::bridge::protocol::{ReturnEnvelope, ReturnId};
use crate::error::BridgeError;

/// A call waiting for its reply.
pub struct PendingCall {
    method: String,
    registered_at: Instant,
    sender: Option<oneshot::Sender<ReturnEnvelope>>,
}

impl PendingCall {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn elapsed(&self) -> Duration {
        self.registered_at.elapsed()
    }

    pub fn is_signalled(&self) -> bool {
        self.sender.is_none()
    }

    /// Hand the reply to the waiting call.
    ///
    /// Gives the reply back if the slot was already signalled or the waiter is gone.
    pub fn signal(&mut self, reply: ReturnEnvelope) -> Result<(), ReturnEnvelope> {
        match self.sender.take() {
            Some(tx) => tx.send(reply),
            None => Err(reply),
        }
    }
}

/// Registry of in-flight calls, scoped to one bridge.
#[derive(Default)]
pub struct PendingCalls {
    calls: DashMap<ReturnId, PendingCall>,
    closed: AtomicBool,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reply slot for `id`. Ids must be unique among pending calls.
    ///
    /// Fails with `Shutdown` once the registry has been closed.
    pub fn register(
        &self,
        id: ReturnId,
        method: &str,
    ) -> Result<oneshot::Receiver<ReturnEnvelope>, BridgeError> {
        let entry = self.calls.entry(id);
        // Read under the shard lock: `cancel_all` sets the flag before it
        // sweeps, so an entry inserted here is either refused or swept.
        if self.closed.load(Ordering::Acquire) {
            return Err(BridgeError::Shutdown);
        }
        match entry {
            Entry::Occupied(entry) => Err(BridgeError::DuplicateReturnId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(PendingCall {
                    method: method.to_string(),
                    registered_at: Instant::now(),
                    sender: Some(tx),
                });
                Ok(rx)
            }
        }
    }

    pub fn take(&self, id: &str) -> Option<PendingCall> {
        self.calls.remove(id).map(|(_, call)| call)
    }

    /// Non-removing lookup. The guard holds a shard lock; never hold it across an await.
    pub fn peek(&self, id: &str) -> Option<RefMut<'_, ReturnId, PendingCall>> {
        self.calls.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.calls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the registry and drop every pending slot. Waiting calls observe
    /// a closed channel; later registrations are refused.
    pub fn cancel_all(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let mut cancelled = 0;
        self.calls.retain(|_, _| {
            cancelled += 1;
            false
        });
        cancelled
    }
}
