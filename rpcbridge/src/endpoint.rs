//! Endpoint - routes frames read from the inbound channel.
//!
//! A single inbound stream carries both replies to our calls and calls made
//! by the foreign side. Replies go to the `Bridge` resolver; calls go to the
//! `ReverseBridge`. When the stream ends, every pending call is failed so no
//! caller waits on a peer that is gone.

use std::io;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;

use crate::bridge::codec::TextCodec;
use crate::bridge::protocol::{CallEnvelope, InboundFrame};
use crate::dispatcher::Bridge;
use crate::error::BridgeError;
use crate::reverse::ReverseBridge;

pub struct Endpoint {
    bridge: Arc<Bridge>,
    reverse: Option<ReverseBridge>,
}

impl Endpoint {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            reverse: None,
        }
    }

    pub fn with_reverse(mut self, reverse: ReverseBridge) -> Self {
        self.reverse = Some(reverse);
        self
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Route one frame, waiting for the inbound handler if it is a call.
    pub async fn route(&self, frame: &str) -> Result<(), BridgeError> {
        match InboundFrame::parse(frame).map_err(BridgeError::InvalidFrame)? {
            InboundFrame::Return(reply) => self.bridge.resolve_envelope(reply),
            InboundFrame::Call(call) => self.reverse_for(&call)?.dispatch(call).await,
        }
    }

    fn reverse_for(&self, call: &CallEnvelope) -> Result<&ReverseBridge, BridgeError> {
        self.reverse.as_ref().ok_or_else(|| BridgeError::NoHandler {
            method: call.method.clone(),
        })
    }

    /// Pump frames from `reader` until EOF, then shut the bridge down.
    ///
    /// Inbound calls run on their own tasks so a handler may itself call back
    /// into the foreign side without stalling reply delivery. Per-frame
    /// errors are logged and skipped; only read errors end the pump early.
    /// Handlers still running at EOF are awaited before returning.
    pub async fn run<R>(&self, reader: R) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let codec = TextCodec::with_max_frame_length(self.bridge.config().max_frame_length);
        let mut frames = FramedRead::new(reader, codec);
        let mut handlers = JoinSet::new();

        let result = loop {
            match frames.next().await {
                Some(Ok(frame)) => {
                    self.pump_frame(&frame, &mut handlers);
                    while handlers.try_join_next().is_some() {}
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Inbound channel read failed");
                    break Err(e);
                }
                None => break Ok(()),
            }
        };

        let cancelled = self.bridge.shutdown();
        tracing::info!(cancelled, in_flight = handlers.len(), "Inbound channel closed");
        while handlers.join_next().await.is_some() {}
        result
    }

    fn pump_frame(&self, frame: &str, handlers: &mut JoinSet<()>) {
        tracing::trace!(frame_size_bytes = frame.len(), "Routing frame");
        match InboundFrame::parse(frame) {
            Ok(InboundFrame::Return(reply)) => {
                if let Err(e) = self.bridge.resolve_envelope(reply) {
                    tracing::warn!(error = %e, "Dropping reply");
                }
            }
            Ok(InboundFrame::Call(call)) => match self.reverse_for(&call) {
                Ok(reverse) => {
                    let reverse = reverse.clone();
                    handlers.spawn(async move {
                        if let Err(e) = reverse.dispatch(call).await {
                            tracing::warn!(error = %e, "Inbound call failed");
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "Dropping inbound call"),
            },
            Err(e) => {
                tracing::warn!(error = %e, frame_size_bytes = frame.len(), "Dropping malformed frame");
            }
        }
    }
}
