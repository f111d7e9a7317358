use bytes::Bytes;
use tokio::sync::mpsc;

/// The downstream consumer went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("frame sink closed")]
pub struct SinkClosed;

/// Transport side of a streaming response.
///
/// The adapter is the only writer for the lifetime of one response.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Connection liveness, polled once per pulled event.
    fn is_connected(&self) -> bool;

    async fn write(&mut self, frame: Bytes) -> Result<(), SinkClosed>;

    /// Pushes written frames to the client. Called after every frame.
    async fn flush(&mut self) -> Result<(), SinkClosed> {
        Ok(())
    }
}

/// Sink feeding a bounded channel, typically drained by an HTTP body stream.
///
/// Each frame is handed to the receiver as soon as there is capacity, so
/// `flush` has nothing to do.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait::async_trait]
impl FrameSink for ChannelSink {
    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn write(&mut self, frame: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(frame).await.map_err(|_| SinkClosed)
    }
}
