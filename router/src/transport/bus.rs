//! Message-bus transport adapter.
//!
//! Publishes the inbound request as a JSON envelope to the route's topic via
//! a producer obtained from the pool. There is no response correlation: the
//! call is fire-and-acknowledge, and a successful publish always reports a
//! 200 with the serialized broker acknowledgement as its body.

use crate::options::{BusOptions, InboundRequest};
use bytes::Bytes;
use hie_router_core::{Clock, Headers, ProducerKey, ProducerPool, Response, RouterError};
use serde::{Deserialize, Serialize};

/// The envelope published for a bus route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEnvelope {
    /// Inbound method.
    pub method: String,
    /// Inbound URL, query string included.
    pub path: String,
    /// URL pattern the channel matched on.
    pub pattern: String,
    /// Inbound headers.
    pub headers: Headers,
    /// Inbound body as a string, empty when the request had none.
    pub body: String,
}

impl BusEnvelope {
    /// Build the envelope for an inbound request.
    #[must_use]
    pub fn new(inbound: &InboundRequest) -> Self {
        Self {
            method: inbound.method.clone(),
            path: inbound.url.clone(),
            pattern: inbound.url_pattern.clone(),
            headers: inbound.headers.clone(),
            body: if inbound.body.is_empty() {
                String::new()
            } else {
                String::from_utf8_lossy(&inbound.body).into_owned()
            },
        }
    }
}

/// Publish one envelope for a bus route.
///
/// # Errors
///
/// Returns the pool's producer-creation error or the broker's publish
/// failure.
pub async fn send(
    opts: &BusOptions,
    inbound: &InboundRequest,
    pool: &dyn ProducerPool,
    clock: &dyn Clock,
) -> Result<Response, RouterError> {
    let producer = pool
        .get_producer(ProducerKey {
            channel_name: inbound.channel_name.clone(),
            client_id: opts.client_id.clone(),
            timeout_ms: u64::try_from(opts.timeout.as_millis()).unwrap_or(u64::MAX),
        })
        .await?;

    let envelope = BusEnvelope::new(inbound);
    let payload = serde_json::to_vec(&envelope)
        .map_err(|err| RouterError::transport(format!("failed to serialize bus envelope: {err}")))?;

    let ack = producer.send(opts.topic.clone(), payload).await?;
    tracing::info!(
        topic = %opts.topic,
        partition = ack.partition,
        offset = ack.offset,
        "Request published to bus route"
    );

    let body = serde_json::to_vec(&ack)
        .map_err(|err| RouterError::transport(format!("failed to serialize publish ack: {err}")))?;

    Ok(Response {
        status: 200,
        headers: Headers::new(),
        body: Bytes::from(body),
        timestamp: clock.now(),
    })
}
