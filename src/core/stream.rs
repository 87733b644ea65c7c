//! Message stream contracts
//!
//! The stream delivers messages at least once. A message is redelivered
//! unless it is explicitly acknowledged with [`OrderStream::commit`].

use crate::core::error::StreamError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A raw message fetched from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl StreamMessage {
    /// Payload as UTF-8 text, lossy, for logging malformed messages
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Consuming side of the stream
#[async_trait]
pub trait OrderStream: Send + Sync {
    /// Wait for the next message
    ///
    /// Blocks until a message is available. Returns [`StreamError::Cancelled`]
    /// as soon as `cancel` fires.
    async fn fetch_next(&self, cancel: &CancellationToken) -> Result<StreamMessage, StreamError>;

    /// Acknowledge a message so it is not redelivered
    async fn commit(&self, message: &StreamMessage) -> Result<(), StreamError>;
}

/// Producing side of the stream
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), StreamError>;
}
