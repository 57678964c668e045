//! Call dispatcher and return resolver.
//!
//! Flow:
//! 1. `call` registers a reply slot under a fresh return id
//! 2. The serialized envelope is handed to the injected transmitter
//! 3. The caller waits on its slot (the only suspension point)
//! 4. The transport delivers the reply via `resolve`, which signals the slot in place
//! 5. `call` wakes, removes its entry, and decodes the output

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bridge::protocol::{CallEnvelope, ReturnEnvelope, ReturnId};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::registry::PendingCalls;
use crate::transmit::Transmitter;

/// Removes a pending entry when the call finishes, fails, or its future is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    return_id: &'a ReturnId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.take(self.return_id.as_str());
    }
}

/// Host-side end of the bridge: issues calls and accepts their replies.
pub struct Bridge {
    pending: Arc<PendingCalls>,
    transmitter: Arc<dyn Transmitter>,
    config: BridgeConfig,
}

impl Bridge {
    /// Bridge with configuration from the environment.
    pub fn new(transmitter: impl Transmitter) -> Self {
        Self::with_config(transmitter, BridgeConfig::default())
    }

    pub fn with_config(transmitter: impl Transmitter, config: BridgeConfig) -> Self {
        Self::with_registry(transmitter, Arc::new(PendingCalls::new()), config)
    }

    /// Bridge over an externally owned registry.
    pub fn with_registry(
        transmitter: impl Transmitter,
        pending: Arc<PendingCalls>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            pending,
            transmitter: Arc::new(transmitter),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    /// Number of calls waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.pending.is_closed()
    }

    /// Call `method` on the foreign side and wait for its reply.
    ///
    /// Returns `Ok(None)` when the reply carries no output. Uses the configured
    /// default deadline, if any.
    pub async fn call<I, O>(
        &self,
        method: &str,
        input: Option<&I>,
    ) -> Result<Option<O>, BridgeError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.dispatch(method, input, self.config.call_timeout).await
    }

    pub async fn call_with_timeout<I, O>(
        &self,
        method: &str,
        input: Option<&I>,
        timeout: Duration,
    ) -> Result<Option<O>, BridgeError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        self.dispatch(method, input, Some(timeout)).await
    }

    /// Like `call`, but writes the output into `out`.
    ///
    /// `out` is only touched when the call succeeds with a non-empty output.
    pub async fn call_into<I, O>(
        &self,
        method: &str,
        out: &mut O,
        input: Option<&I>,
    ) -> Result<(), BridgeError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        if let Some(value) = self.call(method, input).await? {
            *out = value;
        }
        Ok(())
    }

    async fn dispatch<I, O>(
        &self,
        method: &str,
        input: Option<&I>,
        timeout: Option<Duration>,
    ) -> Result<Option<O>, BridgeError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        if method.is_empty() {
            return Err(BridgeError::EmptyMethod);
        }

        let return_id = ReturnId::new();
        let envelope = serde_json::to_string(&CallEnvelope {
            method: method.to_string(),
            input,
            return_id: return_id.clone(),
        })
        .map_err(BridgeError::Encode)?;

        // Register before transmitting so a fast reply always finds its waiter
        let receiver = self.pending.register(return_id.clone(), method)?;
        let guard = PendingGuard {
            pending: &self.pending,
            return_id: &return_id,
        };

        tracing::debug!(%return_id, method, envelope_bytes = envelope.len(), "Dispatching call");

        let exchange = async {
            if let Err(e) = self.transmitter.send(envelope).await {
                tracing::debug!(%return_id, method, error = %e, "Transmit failed");
                return Err(BridgeError::Transmit(e));
            }
            receiver.await.map_err(|_| BridgeError::Shutdown)
        };

        // The deadline covers transmission too: a stalled transmitter times out
        let reply = match timeout {
            Some(after) => match tokio::time::timeout(after, exchange).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(%return_id, method, ?after, "Call timed out");
                    return Err(BridgeError::Timeout {
                        method: method.to_string(),
                        after,
                    });
                }
            },
            None => exchange.await?,
        };
        drop(guard);

        if let Some(message) = reply.remote_error() {
            tracing::debug!(%return_id, method, error = message, "Call failed remotely");
            return Err(BridgeError::Remote(message.to_string()));
        }

        if !reply.has_output() {
            return Ok(None);
        }

        serde_json::from_str(&reply.output)
            .map(Some)
            .map_err(BridgeError::Decode)
    }

    /// Deliver a reply for a previously issued call.
    ///
    /// Empty `error` means success. Fails with `Correlation` when no call is
    /// waiting on `return_id`.
    pub fn resolve(
        &self,
        return_id: &str,
        output: impl Into<String>,
        error: &str,
    ) -> Result<(), BridgeError> {
        self.resolve_envelope(ReturnEnvelope::new(return_id, output, error))
    }

    /// Parse a serialized reply and deliver it.
    pub fn resolve_frame(&self, frame: &str) -> Result<(), BridgeError> {
        let reply: ReturnEnvelope =
            serde_json::from_str(frame).map_err(BridgeError::InvalidFrame)?;
        self.resolve_envelope(reply)
    }

    pub fn resolve_envelope(&self, reply: ReturnEnvelope) -> Result<(), BridgeError> {
        let Some(mut slot) = self.pending.peek(reply.return_id.as_str()) else {
            tracing::debug!(return_id = %reply.return_id, "No pending call for reply");
            return Err(BridgeError::Correlation {
                return_id: reply.return_id,
            });
        };

        tracing::debug!(
            return_id = %reply.return_id,
            method = slot.method(),
            elapsed_ms = slot.elapsed().as_millis() as u64,
            failed = reply.remote_error().is_some(),
            "Resolving call"
        );

        slot.signal(reply).map_err(|reply| BridgeError::Correlation {
            return_id: reply.return_id,
        })
    }

    /// Cancel every pending call and refuse new ones. Waiting and later
    /// callers return `Shutdown`.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            tracing::warn!(cancelled, "Bridge shut down with calls in flight");
        }
        cancelled
    }
}
