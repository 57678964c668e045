//! Framed text codec for envelope streams.
//!
//! Uses LengthDelimitedCodec for framing. Envelopes are already serialized
//! by the time they reach the wire, so frames carry UTF-8 text as-is.
//! Works over any AsyncRead/AsyncWrite (pipes, sockets, stdio).

use std::io;

use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::config::DEFAULT_MAX_FRAME_LENGTH;

/// Codec that frames UTF-8 text with a 4-byte length prefix.
pub struct TextCodec {
    inner: LengthDelimitedCodec,
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCodec {
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .max_frame_length(max_frame_length)
                .new_codec(),
        }
    }
}

impl Decoder for TextCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<String> for TextCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame_len = item.len();
        tracing::trace!(frame_size_bytes = frame_len, "Encoding frame");
        if frame_len > 100_000 {
            tracing::info!(
                frame_size_bytes = frame_len,
                frame_size_kb = frame_len / 1024,
                "Large frame being encoded"
            );
        }
        self.inner.encode(Bytes::from(item), dst)
    }
}
