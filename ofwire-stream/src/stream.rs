//! Message stream over a duplex byte connection.

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::parser::Parser;
use bytes::{Bytes, BytesMut};
use ofwire_protocol::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Owns a connection and turns its bytes into a sequence of messages.
///
/// One background task reads the connection, carves frames with the
/// [`Parser`] and publishes them in wire order. The inbound channel is
/// bounded, so the task stops reading while the consumer is behind.
///
/// The sequence ends after at most one error: `ConnectionClosed` on an orderly
/// close, `UnexpectedEof` when the close cut a message short, or the I/O or
/// decode failure that stopped the task. After that [`recv`](Self::recv)
/// returns `None`.
pub struct MessageStream<M> {
    inbound: mpsc::Receiver<Result<M, StreamError>>,
    outbound: mpsc::Sender<Bytes>,
    shutdown: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> MessageStream<M> {
    /// Starts a stream with default configuration.
    pub fn new<C, P>(conn: C, parser: P) -> Self
    where
        C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        P: Parser<Message = M>,
    {
        Self::with_config(conn, parser, StreamConfig::default())
    }

    /// Starts a stream. Must be called from within a tokio runtime.
    pub fn with_config<C, P>(conn: C, parser: P, config: StreamConfig) -> Self
    where
        C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        P: Parser<Message = M>,
    {
        let (inbound_tx, inbound) = mpsc::channel(config.inbound_capacity.max(1));
        let (outbound, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (shutdown, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run(conn, parser, config, inbound_tx, outbound_rx, shutdown_rx));

        Self {
            inbound,
            outbound,
            shutdown,
            task: Some(task),
        }
    }

    /// Receives the next message, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<M, StreamError>> {
        self.inbound.recv().await
    }

    /// Encodes and queues a message for writing. A message that cannot be
    /// encoded is rejected here and the stream keeps running.
    pub async fn send(&self, msg: &impl Message) -> Result<(), StreamError> {
        let bytes = msg.encode()?;
        self.send_bytes(bytes).await
    }

    /// Queues raw bytes for writing. Fails with `Closed` once the stream has
    /// ended.
    pub async fn send_bytes(&self, bytes: Bytes) -> Result<(), StreamError> {
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Stops the background task and waits for it to exit. Releases the
    /// connection.
    pub async fn close(mut self) {
        let _ = self.shutdown.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("message stream task failed: {}", e);
            }
        }
    }

    /// Returns whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl<M> Drop for MessageStream<M> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Body of the background task.
async fn run<C, P>(
    mut conn: C,
    parser: P,
    config: StreamConfig,
    inbound: mpsc::Sender<Result<P::Message, StreamError>>,
    mut outbound: mpsc::Receiver<Bytes>,
    mut shutdown: broadcast::Receiver<()>,
) where
    C: AsyncRead + AsyncWrite + Unpin,
    P: Parser,
{
    tracing::info!("message stream started");
    let mut buf = BytesMut::with_capacity(config.read_buffer_size);
    let mut chunk = vec![0u8; config.read_buffer_size];

    let outcome = 'session: loop {
        // Publish every complete message already buffered
        loop {
            let next = carve(&parser, &mut buf, config.max_message_size);
            match next {
                Ok(Some(msg)) => {
                    if !publish(&inbound, &mut shutdown, Ok(msg)).await {
                        tracing::debug!("message stream stopped while publishing");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => break 'session e,
            }
        }

        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                tracing::info!("message stream closed by owner");
                return;
            }

            Some(bytes) = outbound.recv() => {
                tracing::debug!("message stream: writing {} bytes", bytes.len());
                // A peer that stops reading must not hold up close()
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        tracing::info!("message stream closed by owner during write");
                        return;
                    }
                    written = write(&mut conn, &bytes) => {
                        if let Err(e) = written {
                            break 'session StreamError::Io(e);
                        }
                    }
                }
            }

            result = conn.read(&mut chunk) => {
                match result {
                    Ok(0) if buf.is_empty() => {
                        tracing::debug!("message stream: connection closed");
                        break 'session StreamError::ConnectionClosed;
                    }
                    Ok(0) => {
                        tracing::debug!(
                            "message stream: connection closed with {} bytes buffered",
                            buf.len()
                        );
                        break 'session StreamError::UnexpectedEof { buffered: buf.len() };
                    }
                    Ok(n) => {
                        tracing::debug!("message stream: received {} bytes", n);
                        buf.extend_from_slice(&chunk[..n]);
                    }
                    Err(e) => {
                        tracing::debug!("message stream: read error: {}", e);
                        break 'session StreamError::Io(e);
                    }
                }
            }
        }
    };

    // Senders see `Closed` from here on
    drop(outbound);

    match &outcome {
        StreamError::ConnectionClosed => {}
        StreamError::Decode(e) => tracing::warn!("message stream: decode failed: {}", e),
        e => tracing::warn!("message stream: {}", e),
    }
    publish(&inbound, &mut shutdown, Err(outcome)).await;
    tracing::info!("message stream ended");
}

/// Removes and decodes the next complete message at the front of `buf`.
fn carve<P: Parser>(
    parser: &P,
    buf: &mut BytesMut,
    max_message_size: usize,
) -> Result<Option<P::Message>, StreamError> {
    let Some(len) = parser.frame_len(buf)? else {
        return Ok(None);
    };
    if len > max_message_size {
        return Err(StreamError::MessageTooLarge {
            size: len,
            max: max_message_size,
        });
    }
    if buf.len() < len {
        return Ok(None);
    }
    let frame = buf.split_to(len);
    tracing::debug!("message stream: carved {} byte frame", len);
    Ok(Some(parser.parse(&frame)?))
}

/// Hands an item to the consumer, waiting for channel capacity. Returns
/// `false` if the owner stopped the stream or the consumer is gone.
async fn publish<M>(
    inbound: &mpsc::Sender<Result<M, StreamError>>,
    shutdown: &mut broadcast::Receiver<()>,
    item: Result<M, StreamError>,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.recv() => false,
        sent = inbound.send(item) => sent.is_ok(),
    }
}

async fn write<C: AsyncWrite + Unpin>(conn: &mut C, bytes: &[u8]) -> std::io::Result<()> {
    conn.write_all(bytes).await?;
    conn.flush().await
}
