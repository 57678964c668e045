//! Error taxonomy for calls, replies and inbound dispatch.

use std::io;
use std::time::Duration;

use crate::bridge::protocol::ReturnId;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("method name must not be empty")]
    EmptyMethod,

    /// The outbound call could not be serialized.
    #[error("failed to encode call: {0}")]
    Encode(#[source] serde_json::Error),

    /// The injected transmitter refused the call.
    #[error("failed to transmit call: {0}")]
    Transmit(#[source] io::Error),

    /// The foreign side reported an application-level failure.
    #[error("remote error: {0}")]
    Remote(String),

    /// A non-empty reply payload did not match the expected output type.
    #[error("failed to decode call output: {0}")]
    Decode(#[source] serde_json::Error),

    /// A reply arrived for an id with no waiting call (unknown, duplicate,
    /// or already abandoned after a timeout).
    #[error("no pending call for return id {return_id}")]
    Correlation { return_id: ReturnId },

    #[error("call to {method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The bridge was shut down before or while the call was waiting.
    #[error("bridge is shut down")]
    Shutdown,

    #[error("return id {0} is already pending")]
    DuplicateReturnId(ReturnId),

    #[error("malformed frame: {0}")]
    InvalidFrame(#[source] serde_json::Error),

    #[error("no handler registered for inbound call to {method}")]
    NoHandler { method: String },

    #[error("handler failed: {0}")]
    Handler(String),
}

impl BridgeError {
    pub fn is_correlation(&self) -> bool {
        matches!(self, Self::Correlation { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Message text reported by the foreign side, if this is a remote error.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Remote(message) => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
