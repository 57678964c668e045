//! Outbound transmission - the injected capability that carries a serialized
//! envelope to the other side.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::FramedWrite;

use crate::bridge::codec::TextCodec;

/// Delivers one serialized envelope. Must be callable from many tasks at once.
#[async_trait]
pub trait Transmitter: Send + Sync + 'static {
    async fn send(&self, envelope: String) -> io::Result<()>;
}

#[async_trait]
impl<T: Transmitter + ?Sized> Transmitter for Arc<T> {
    async fn send(&self, envelope: String) -> io::Result<()> {
        (**self).send(envelope).await
    }
}

#[async_trait]
impl Transmitter for mpsc::UnboundedSender<String> {
    async fn send(&self, envelope: String) -> io::Result<()> {
        mpsc::UnboundedSender::send(self, envelope)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transmit channel closed"))
    }
}

#[async_trait]
impl Transmitter for mpsc::Sender<String> {
    async fn send(&self, envelope: String) -> io::Result<()> {
        mpsc::Sender::send(self, envelope)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "transmit channel closed"))
    }
}

/// Transmitter backed by a synchronous closure.
pub struct FnTransmitter<F> {
    f: F,
}

/// Wrap a closure such as a foreign runtime's `postMessage` binding.
pub fn from_fn<F>(f: F) -> FnTransmitter<F>
where
    F: Fn(String) -> io::Result<()> + Send + Sync + 'static,
{
    FnTransmitter { f }
}

#[async_trait]
impl<F> Transmitter for FnTransmitter<F>
where
    F: Fn(String) -> io::Result<()> + Send + Sync + 'static,
{
    async fn send(&self, envelope: String) -> io::Result<()> {
        (self.f)(envelope)
    }
}

/// Writes each envelope as one length-prefixed frame.
///
/// Frames from concurrent callers are serialized by an async mutex so they never interleave.
pub struct FramedTransmitter<W> {
    writer: Mutex<FramedWrite<W, TextCodec>>,
}

impl<W> FramedTransmitter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W, max_frame_length: usize) -> Self {
        Self {
            writer: Mutex::new(FramedWrite::new(
                writer,
                TextCodec::with_max_frame_length(max_frame_length),
            )),
        }
    }
}

#[async_trait]
impl<W> Transmitter for FramedTransmitter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, envelope: String) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Mutex as StdMutex;
    use tokio_util::codec::FramedRead;

    #[tokio::test]
    async fn unbounded_channel_transmits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        Transmitter::send(&tx, "frame".to_string()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("frame"));
    }

    #[tokio::test]
    async fn closed_channel_is_broken_pipe() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(rx);
        let err = Transmitter::send(&tx, "frame".to_string()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn closure_transmitter_receives_envelope() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let transmitter = from_fn(move |envelope| {
            sink.lock().unwrap().push(envelope);
            Ok(())
        });

        transmitter.send("a".to_string()).await.unwrap();
        transmitter.send("b".to_string()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn framed_transmitter_writes_whole_frames() {
        let (writer, reader) = tokio::io::duplex(64 * 1024);
        let transmitter = Arc::new(FramedTransmitter::new(writer, 1024));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let transmitter = Arc::clone(&transmitter);
            tasks.push(tokio::spawn(async move {
                transmitter.send(format!("frame-{}", i)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(transmitter);

        let frames: Vec<String> = FramedRead::new(reader, TextCodec::new())
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(frames.len(), 16);
        for i in 0..16 {
            assert!(frames.contains(&format!("frame-{}", i)));
        }
    }
}
