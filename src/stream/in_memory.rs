//! In-process message broker for development and testing
//!
//! `InMemoryBroker` is a single-partition topic that implements both
//! [`OrderPublisher`] and [`OrderStream`]. It keeps the at-least-once contract
//! of a real broker: a fetched message stays in flight until it is committed,
//! and [`InMemoryBroker::redeliver_uncommitted`] puts every uncommitted message
//! back at the head of the queue, as a consumer-group rebalance would.

use crate::core::{OrderPublisher, OrderStream, StreamError, StreamMessage};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct BrokerState {
    next_offset: i64,
    pending: VecDeque<StreamMessage>,
    in_flight: BTreeMap<i64, StreamMessage>,
    committed: Vec<i64>,
    closed: bool,
}

/// In-process topic shared by producers and consumers
///
/// Cloning yields another handle to the same topic.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a raw payload to the topic and return its offset
    pub fn push(&self, key: Option<Vec<u8>>, payload: Vec<u8>) -> Result<i64, StreamError> {
        let offset = {
            let mut state = self.state();
            if state.closed {
                return Err(StreamError::Closed);
            }
            let offset = state.next_offset;
            state.next_offset += 1;
            state.pending.push_back(StreamMessage {
                partition: 0,
                offset,
                key,
                payload,
            });
            offset
        };
        self.notify.notify_waiters();
        Ok(offset)
    }

    /// Move every fetched but uncommitted message back to the head of the
    /// queue, preserving offset order. Returns how many were requeued.
    pub fn redeliver_uncommitted(&self) -> usize {
        let requeued = {
            let mut state = self.state();
            let in_flight = std::mem::take(&mut state.in_flight);
            let count = in_flight.len();
            for message in in_flight.into_values().rev() {
                state.pending.push_front(message);
            }
            count
        };
        if requeued > 0 {
            self.notify.notify_waiters();
        }
        requeued
    }

    /// Stop accepting messages; consumers get [`StreamError::Closed`] once
    /// the queue is drained.
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_waiters();
    }

    /// Offsets acknowledged so far, in commit order
    pub fn committed_offsets(&self) -> Vec<i64> {
        self.state().committed.clone()
    }

    /// Offsets fetched but not yet acknowledged
    pub fn in_flight(&self) -> Vec<i64> {
        self.state().in_flight.keys().copied().collect()
    }

    /// Number of messages waiting to be fetched
    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }
}

#[async_trait]
impl OrderPublisher for InMemoryBroker {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), StreamError> {
        self.push(Some(key.as_bytes().to_vec()), payload).map(|_| ())
    }
}

#[async_trait]
impl OrderStream for InMemoryBroker {
    async fn fetch_next(&self, cancel: &CancellationToken) -> Result<StreamMessage, StreamError> {
        loop {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }

            // Register interest before inspecting the queue so a push between
            // the check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(message) = state.pending.pop_front() {
                    state.in_flight.insert(message.offset, message.clone());
                    return Ok(message);
                }
                if state.closed {
                    return Err(StreamError::Closed);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    async fn commit(&self, message: &StreamMessage) -> Result<(), StreamError> {
        let mut state = self.state();
        if state.in_flight.remove(&message.offset).is_none() {
            return Err(StreamError::UnknownMessage {
                offset: message.offset,
            });
        }
        state.committed.push(message.offset);
        Ok(())
    }
}
