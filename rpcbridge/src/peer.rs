//! Echo peer - a stand-in for the foreign side.
//!
//! Answers every call with its own input. The reserved `Fail` method replies
//! with an error instead, carrying the input text as the message.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bridge::protocol::{CallEnvelope, ReturnEnvelope};
use crate::reverse::{CallHandler, HandlerError};
use crate::transmit::Transmitter;

pub const FAIL_METHOD: &str = "Fail";

pub struct EchoHandler {
    replies: Arc<dyn Transmitter>,
}

impl EchoHandler {
    pub fn new(replies: impl Transmitter) -> Self {
        Self {
            replies: Arc::new(replies),
        }
    }

    fn reply_for(call: CallEnvelope) -> ReturnEnvelope {
        if call.method == FAIL_METHOD {
            let message = call
                .decode_input::<String>()
                .ok()
                .flatten()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "requested failure".to_string());
            return ReturnEnvelope::failed(call.return_id, message);
        }

        // Echo the input text as sent; re-encoding would round numbers
        let output = call.input_text().unwrap_or_default().to_string();
        ReturnEnvelope::succeeded(call.return_id, output)
    }
}

#[async_trait]
impl CallHandler for EchoHandler {
    async fn handle(&self, call: CallEnvelope) -> Result<(), HandlerError> {
        let reply = Self::reply_for(call);
        tracing::trace!(return_id = %reply.return_id, "Echoing reply");
        self.replies.send(serde_json::to_string(&reply)?).await?;
        Ok(())
    }
}
