//! Reverse dispatch - calls initiated by the foreign side.
//!
//! This is a thin pass-through: the registered handler executes the call and
//! is itself responsible for sending any reply. Nothing is correlated here.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bridge::protocol::CallEnvelope;
use crate::error::BridgeError;

/// Failure reported by a `CallHandler`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for HandlerError {
    fn from(e: io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Code that can process an inbound call.
///
/// The call's input is handed over as the raw JSON text the peer sent; use
/// `CallEnvelope::decode_input` to parse it into a concrete type.
#[async_trait]
pub trait CallHandler: Send + Sync + 'static {
    async fn handle(&self, call: CallEnvelope) -> Result<(), HandlerError>;
}

/// Entry point for foreign-initiated calls.
#[derive(Clone)]
pub struct ReverseBridge {
    handler: Arc<dyn CallHandler>,
}

impl ReverseBridge {
    pub fn new(handler: impl CallHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_arc(handler: Arc<dyn CallHandler>) -> Self {
        Self { handler }
    }

    /// Parse a serialized call and hand it to the handler.
    pub async fn handle_inbound(&self, serialized_call: &str) -> Result<(), BridgeError> {
        let call: CallEnvelope =
            serde_json::from_str(serialized_call).map_err(BridgeError::InvalidFrame)?;
        self.dispatch(call).await
    }

    pub async fn dispatch(&self, call: CallEnvelope) -> Result<(), BridgeError> {
        if call.method.is_empty() {
            return Err(BridgeError::EmptyMethod);
        }

        tracing::debug!(return_id = %call.return_id, method = %call.method, "Handling inbound call");
        let method = call.method.clone();
        self.handler.handle(call).await.map_err(|e| {
            tracing::debug!(%method, error = %e, "Inbound call handler failed");
            BridgeError::Handler(e.message)
        })
    }
}
