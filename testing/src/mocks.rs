//! In-memory mock implementations of the engine's collaborator traits.

use chrono::{DateTime, Utc};
use hie_router_core::{
    BusError, BusProducer, CertEntry, Clock, EventError, EventSink, Keystore, KeystoreError,
    KeystoreProvider, ProducerKey, ProducerPool, PublishAck, RequestContext, RouteEvent,
    RouteRecord, StoreError, TransactionStore,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Fixed clock for deterministic tests: always returns the same time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a fixed clock.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A default fixed clock for tests (2025-01-01 00:00:00 UTC).
///
/// # Panics
///
/// Panics if the hardcoded timestamp fails to parse, which should never
/// happen in practice.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// A keystore with placeholder PEM material and one CA entry named
/// `"upstream"`.
#[must_use]
pub fn test_keystore() -> Keystore {
    Keystore {
        key: "test-client-key".to_string(),
        cert: CertEntry::new("client", "test-client-cert"),
        ca: vec![CertEntry::new("upstream", "test-upstream-ca")],
    }
}

/// Keystore provider returning a fixed keystore, or failing on demand.
pub struct StaticKeystoreProvider {
    keystore: Option<Keystore>,
    error: Option<String>,
}

impl StaticKeystoreProvider {
    /// Always return the given keystore.
    #[must_use]
    pub const fn new(keystore: Keystore) -> Self {
        Self {
            keystore: Some(keystore),
            error: None,
        }
    }

    /// Always fail with the given message.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            keystore: None,
            error: Some(message.into()),
        }
    }
}

impl KeystoreProvider for StaticKeystoreProvider {
    fn get_keystore(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Keystore, KeystoreError>> + Send + '_>> {
        Box::pin(async move {
            match (&self.keystore, &self.error) {
                (Some(keystore), _) => Ok(keystore.clone()),
                (None, Some(message)) => Err(KeystoreError::Unavailable(message.clone())),
                (None, None) => Err(KeystoreError::Unavailable("empty provider".to_string())),
            }
        })
    }
}

/// In-memory transaction store that logs its calls in order.
#[derive(Default)]
pub struct MemoryTransactionStore {
    records: Mutex<Vec<RouteRecord>>,
    operations: Mutex<Vec<String>>,
    fail: bool,
}

impl MemoryTransactionStore {
    /// A store that accepts every write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every write.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            operations: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every record stored so far, in store order.
    #[must_use]
    pub fn records(&self) -> Vec<RouteRecord> {
        self.records.lock().expect("store lock poisoned").clone()
    }

    /// The calls made against the store, in order, as
    /// `storeNonPrimaryResponse:<route>` and `setFinalStatus:<transaction>`.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().expect("store lock poisoned").clone()
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn store_non_primary_response<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        record: &'a RouteRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail {
                return Err(StoreError::Database("store rejected the write".to_string()));
            }
            self.operations
                .lock()
                .expect("store lock poisoned")
                .push(format!("storeNonPrimaryResponse:{}", record.name));
            self.records
                .lock()
                .expect("store lock poisoned")
                .push(record.clone());
            Ok(())
        })
    }

    fn set_final_status<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail {
                return Err(StoreError::Database("store rejected the write".to_string()));
            }
            self.operations
                .lock()
                .expect("store lock poisoned")
                .push(format!("setFinalStatus:{}", ctx.transaction_id));
            Ok(())
        })
    }
}

/// In-memory event sink.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RouteEvent>>,
    fail: bool,
}

impl MemoryEventSink {
    /// A sink that accepts every buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every buffer.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every event saved so far.
    #[must_use]
    pub fn events(&self) -> Vec<RouteEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

impl EventSink for MemoryEventSink {
    fn save_events(
        &self,
        events: Vec<RouteEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + '_>> {
        Box::pin(async move {
            if self.fail {
                return Err(EventError::Database("sink rejected the write".to_string()));
            }
            self.events
                .lock()
                .expect("sink lock poisoned")
                .extend(events);
            Ok(())
        })
    }
}

/// One message captured by [`CapturingProducerPool`].
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    /// Pool key the producer was obtained with.
    pub key: ProducerKey,
    /// Topic the message was published to.
    pub topic: String,
    /// Serialized message payload.
    pub payload: Vec<u8>,
}

/// Producer pool that captures published messages instead of talking to a
/// broker.
#[derive(Default)]
pub struct CapturingProducerPool {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
    fail_publish: Option<String>,
}

impl CapturingProducerPool {
    /// A pool whose producers acknowledge every publish.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool whose producers fail every publish with the given reason.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail_publish: Some(reason.into()),
        }
    }

    /// Every message published so far.
    #[must_use]
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().expect("pool lock poisoned").clone()
    }
}

impl ProducerPool for CapturingProducerPool {
    fn get_producer(
        &self,
        key: ProducerKey,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn BusProducer>, BusError>> + Send + '_>> {
        Box::pin(async move {
            Ok(Arc::new(CapturingProducer {
                key,
                messages: Arc::clone(&self.messages),
                fail: self.fail_publish.clone(),
            }) as Arc<dyn BusProducer>)
        })
    }
}

struct CapturingProducer {
    key: ProducerKey,
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
    fail: Option<String>,
}

impl BusProducer for CapturingProducer {
    fn send(
        &self,
        topic: String,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PublishAck, BusError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(reason) = &self.fail {
                return Err(BusError::PublishFailed {
                    topic,
                    reason: reason.clone(),
                });
            }
            let mut messages = self.messages.lock().expect("pool lock poisoned");
            let offset = i64::try_from(messages.len()).unwrap_or(i64::MAX);
            messages.push(PublishedMessage {
                key: self.key.clone(),
                topic,
                payload,
            });
            Ok(PublishAck {
                partition: 0,
                offset,
            })
        })
    }
}
