//! Wire layer for the host/foreign channel.
//!
//! # Architecture
//!
//! - **protocol**: Envelope types (CallEnvelope, ReturnEnvelope, InboundFrame)
//! - **codec**: Length-prefixed text framing for AsyncRead/AsyncWrite

pub mod codec;
pub mod protocol;
