//! Transport: the downstream `publish(event, topic)` contract
//!
//! The message broker client lives outside this crate. Two transports ship
//! with it: an in-process channel and a JSON-lines writer.

use crate::model::RawEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Delivers processed events downstream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, event: &RawEvent, topic: &str) -> Result<(), TransportError>;
}

/// An event paired with the topic it was published to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub event: RawEvent,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    topic: &'a str,
    event: &'a RawEvent,
}

/// Publishes into a bounded in-process channel.
///
/// `publish` waits for capacity, so a slow consumer slows its producers.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn publish(&self, event: &RawEvent, topic: &str) -> Result<(), TransportError> {
        self.tx
            .send(Envelope {
                topic: topic.to_string(),
                event: event.clone(),
            })
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Writes one `{"topic": ..., "event": ...}` JSON line per event.
pub struct WriterTransport<W> {
    writer: Mutex<W>,
}

impl<W> WriterTransport<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterTransport<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> Transport for WriterTransport<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn publish(&self, event: &RawEvent, topic: &str) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(&EnvelopeRef { topic, event })?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
