//! rpcbridge: call/response correlation over one-way string channels.
//!
//! A host and a foreign runtime that can only post strings to each other get
//! request/reply semantics: `Bridge::call` sends a serialized envelope and
//! waits for the reply the transport hands back through `Bridge::resolve`;
//! calls from the foreign side are passed to a `CallHandler` via
//! `ReverseBridge`.

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod peer;
pub mod registry;
pub mod reverse;
pub mod transmit;

pub use bridge::protocol::{CallEnvelope, InboundFrame, ReturnEnvelope, ReturnId};
pub use config::BridgeConfig;
pub use dispatcher::Bridge;
pub use endpoint::Endpoint;
pub use error::{BridgeError, Result};
pub use registry::{PendingCall, PendingCalls};
pub use reverse::{CallHandler, HandlerError, ReverseBridge};
pub use transmit::{FnTransmitter, FramedTransmitter, Transmitter};
