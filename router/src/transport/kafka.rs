//! Kafka-backed producer pool.
//!
//! Producers are created lazily and cached by `(channel, clientId, timeout)`,
//! so concurrent dispatches on the same channel share one producer. The
//! route timeout becomes the producer's `message.timeout.ms` as well as the
//! publish await bound.

use hie_router_core::{BusError, BusProducer, ProducerKey, ProducerPool, PublishAck};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Producer pool backed by rdkafka.
pub struct KafkaProducerPool {
    brokers: String,
    producers: Mutex<HashMap<ProducerKey, Arc<KafkaProducer>>>,
}

impl KafkaProducerPool {
    /// Create a pool publishing to the given brokers.
    #[must_use]
    pub fn new<I, S>(brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            brokers: brokers
                .into_iter()
                .map(Into::into)
                .collect::<Vec<_>>()
                .join(","),
            producers: Mutex::new(HashMap::new()),
        }
    }

    fn create_producer(&self, key: &ProducerKey) -> Result<Arc<KafkaProducer>, BusError> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &key.client_id)
            .set("message.timeout.ms", key.timeout_ms.to_string());

        let producer: FutureProducer = config
            .create()
            .map_err(|err| BusError::ProducerCreation(err.to_string()))?;

        tracing::info!(
            brokers = %self.brokers,
            channel = %key.channel_name,
            client_id = %key.client_id,
            timeout_ms = key.timeout_ms,
            "Created bus producer"
        );

        Ok(Arc::new(KafkaProducer {
            inner: producer,
            timeout: Duration::from_millis(key.timeout_ms),
        }))
    }
}

impl ProducerPool for KafkaProducerPool {
    fn get_producer(
        &self,
        key: ProducerKey,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn BusProducer>, BusError>> + Send + '_>> {
        Box::pin(async move {
            let mut pool = self
                .producers
                .lock()
                .map_err(|_| BusError::ProducerCreation("producer pool lock poisoned".to_string()))?;

            if let Some(producer) = pool.get(&key) {
                return Ok(Arc::clone(producer) as Arc<dyn BusProducer>);
            }

            let producer = self.create_producer(&key)?;
            pool.insert(key, Arc::clone(&producer));
            Ok(producer as Arc<dyn BusProducer>)
        })
    }
}

struct KafkaProducer {
    inner: FutureProducer,
    timeout: Duration,
}

impl BusProducer for KafkaProducer {
    fn send(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PublishAck, BusError>> + Send + '_>> {
        Box::pin(async move {
            let record: FutureRecord<'_, (), Vec<u8>> =
                FutureRecord::to(&topic).payload(&payload);

            match self.inner.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(topic = %topic, partition, offset, "Message published");
                    Ok(PublishAck { partition, offset })
                }
                Err((err, _)) => {
                    tracing::error!(topic = %topic, error = %err, "Failed to publish message");
                    Err(BusError::PublishFailed {
                        topic,
                        reason: err.to_string(),
                    })
                }
            }
        })
    }
}
