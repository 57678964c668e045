//! Wire envelopes exchanged with the foreign side.
//!
//! Field names follow the peer convention:
//! - **Call**: `Method`, `Input` (omitted when absent), `ReturnID`
//! - **Return**: `ReturnID`, `Output` (serialized value, possibly empty), `Error`

use std::borrow::Borrow;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Identifier correlating a call with its reply.
///
/// Fresh ids are UUID v4 text. Ids handed back by the foreign side are taken
/// as-is, so any string is accepted on parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnId(String);

impl ReturnId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReturnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReturnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ReturnId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReturnId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for ReturnId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One invocation, in either direction.
///
/// Outbound calls borrow their input (`CallEnvelope<&I>`) so it is serialized
/// in place. Inbound calls keep the input as the exact JSON text the peer sent,
/// so numbers outside `f64` range or precision reach the handler untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope<I = Box<RawValue>> {
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "Input", default, skip_serializing_if = "Option::is_none")]
    pub input: Option<I>,
    #[serde(rename = "ReturnID")]
    pub return_id: ReturnId,
}

impl CallEnvelope {
    /// Input exactly as serialized by the caller.
    pub fn input_text(&self) -> Option<&str> {
        self.input.as_deref().map(RawValue::get)
    }

    /// Decode the input into `T`. `Ok(None)` when the call carried no input.
    pub fn decode_input<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.input_text().map(serde_json::from_str::<T>).transpose()
    }
}

/// Outcome of one call as reported by the side that executed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnEnvelope {
    #[serde(rename = "ReturnID")]
    pub return_id: ReturnId,
    #[serde(rename = "Output", default)]
    pub output: String,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReturnEnvelope {
    /// Build a reply from the raw resolver arguments. Empty error text means success.
    pub fn new(return_id: impl Into<ReturnId>, output: impl Into<String>, error: &str) -> Self {
        Self {
            return_id: return_id.into(),
            output: output.into(),
            error: (!error.is_empty()).then(|| error.to_string()),
        }
    }

    pub fn succeeded(return_id: impl Into<ReturnId>, output: impl Into<String>) -> Self {
        Self::new(return_id, output, "")
    }

    pub fn failed(return_id: impl Into<ReturnId>, error: impl Into<String>) -> Self {
        Self {
            return_id: return_id.into(),
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Remote failure text. Peers that send `"Error": ""` mean success.
    pub fn remote_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }
}

/// A frame read from the inbound channel: either a foreign-initiated call or
/// a reply to one of ours.
///
/// A frame with a non-null `Method` field is a call; anything else is parsed
/// as a reply. Other fields play no part in the decision, so a reply that
/// carries `"Method": null` is still a reply.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Call(CallEnvelope),
    Return(ReturnEnvelope),
}

/// Only the discriminating field; everything else is skipped unparsed.
#[derive(Deserialize)]
struct FrameKind {
    #[serde(rename = "Method", default)]
    method: Option<IgnoredAny>,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let kind: FrameKind = serde_json::from_str(text)?;
        if kind.method.is_some() {
            serde_json::from_str(text).map(Self::Call)
        } else {
            serde_json::from_str(text).map(Self::Return)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_return_ids_are_unique_uuids() {
        let a = ReturnId::new();
        let b = ReturnId::new();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn call_envelope_with_input() {
        let input = "hi";
        let call = CallEnvelope {
            method: "Echo".to_string(),
            input: Some(&input),
            return_id: ReturnId::from("X"),
        };
        insta::assert_json_snapshot!("call_envelope_with_input", call);
    }

    #[test]
    fn call_envelope_without_input() {
        let call: CallEnvelope<&()> = CallEnvelope {
            method: "Ping".to_string(),
            input: None,
            return_id: ReturnId::from("Y"),
        };
        let text = serde_json::to_string(&call).unwrap();
        assert_eq!(text, r#"{"Method":"Ping","ReturnID":"Y"}"#);
    }

    #[test]
    fn return_envelope_empty_error_is_success() {
        let reply = ReturnEnvelope::new("X", "\"hi\"", "");
        assert_eq!(reply.error, None);
        assert_eq!(reply.remote_error(), None);
        assert!(reply.has_output());

        let reply: ReturnEnvelope =
            serde_json::from_str(r#"{"ReturnID":"X","Output":"","Error":""}"#).unwrap();
        assert_eq!(reply.remote_error(), None);
        assert!(!reply.has_output());
    }

    #[test]
    fn return_envelope_tolerates_missing_fields() {
        let reply: ReturnEnvelope =
            serde_json::from_str(r#"{"ReturnID":"X","Error":null}"#).unwrap();
        assert_eq!(reply.return_id.as_str(), "X");
        assert_eq!(reply.output, "");
        assert_eq!(reply.error, None);
    }

    #[test]
    fn failed_reply_serializes_error() {
        let reply = ReturnEnvelope::failed("X", "boom");
        insta::assert_json_snapshot!("return_envelope_failed", reply);
    }

    #[test]
    fn inbound_frame_classifies_calls_and_returns() {
        let frame = InboundFrame::parse(r#"{"Method":"Notify","Input":{"n":1},"ReturnID":"r1"}"#)
            .unwrap();
        match frame {
            InboundFrame::Call(call) => {
                assert_eq!(call.method, "Notify");
                assert_eq!(call.input_text(), Some(r#"{"n":1}"#));
                assert_eq!(
                    call.decode_input::<serde_json::Value>().unwrap(),
                    Some(json!({"n": 1}))
                );
                assert_eq!(call.return_id.as_str(), "r1");
            }
            other => panic!("expected call, got {:?}", other),
        }

        let frame = InboundFrame::parse(r#"{"ReturnID":"r2","Output":"42"}"#).unwrap();
        match frame {
            InboundFrame::Return(reply) => {
                assert_eq!(reply.return_id.as_str(), "r2");
                assert_eq!(reply.output, "42");
            }
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn inbound_frame_without_method_value_is_a_return() {
        let frame =
            InboundFrame::parse(r#"{"Method":null,"ReturnID":"r3","Output":"1"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Return(ref reply) if reply.output == "1"));
    }

    #[test]
    fn inbound_call_input_is_kept_verbatim() {
        let frame = InboundFrame::parse(
            r#"{"Method":"Big","Input":123456789012345678901234567890,"ReturnID":"r4"}"#,
        )
        .unwrap();
        let InboundFrame::Call(call) = frame else {
            panic!("expected call");
        };
        assert_eq!(call.input_text(), Some("123456789012345678901234567890"));

        let frame =
            InboundFrame::parse(r#"{"Method":"Huge","Input":1e400,"ReturnID":"r5"}"#).unwrap();
        let InboundFrame::Call(call) = frame else {
            panic!("expected call");
        };
        assert_eq!(call.input_text(), Some("1e400"));
    }

    #[test]
    fn missing_or_null_input_is_none() {
        let call: CallEnvelope =
            serde_json::from_str(r#"{"Method":"Ping","ReturnID":"r"}"#).unwrap();
        assert_eq!(call.input_text(), None);
        assert_eq!(call.decode_input::<u32>().unwrap(), None);

        let call: CallEnvelope =
            serde_json::from_str(r#"{"Method":"Ping","Input":null,"ReturnID":"r"}"#).unwrap();
        assert!(call.input.is_none());
    }

    #[test]
    fn inbound_frame_rejects_garbage() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"Output":"1"}"#).is_err());
    }
}
