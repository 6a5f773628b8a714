//! The message-bus producer pool collaborator.
//!
//! Bus routes publish through producers obtained from an external pool.
//! Producers are cached by `(channel name, client id, timeout)`, so
//! concurrent dispatches on the same channel share one producer.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Cache key for a pooled producer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProducerKey {
    /// Channel the route belongs to.
    pub channel_name: String,
    /// Client id configured on the bus route.
    pub client_id: String,
    /// Effective route timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Broker acknowledgement for a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// Partition the message landed on.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

/// A producer capable of publishing one message to a topic.
pub trait BusProducer: Send + Sync {
    /// Publish `payload` to `topic` and wait for the broker acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] when the broker rejects the
    /// message or the publish times out.
    fn send(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PublishAck, BusError>> + Send + '_>>;
}

/// Pool of bus producers keyed by [`ProducerKey`].
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// pool can be injected as `Arc<dyn ProducerPool>`.
pub trait ProducerPool: Send + Sync {
    /// Fetch (or create) the producer for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ProducerCreation`] when a new producer cannot be
    /// built.
    fn get_producer(
        &self,
        key: ProducerKey,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn BusProducer>, BusError>> + Send + '_>>;
}
