//! Dependency injection for the routing engine.
//!
//! The engine never reaches for globals: configuration, the clock, and every
//! external collaborator arrive bundled in a [`RouterEnvironment`]. Tests
//! inject in-memory mocks and a fixed clock; production wires the real
//! keystore, store, event sink, and producer pool.

use crate::config::RouterConfig;
use crate::events::EventSink;
use crate::keystore::KeystoreProvider;
use crate::producer::ProducerPool;
use crate::store::TransactionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of timestamps for responses, records, and events.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The routing engine's injected dependencies.
#[derive(Clone)]
pub struct RouterEnvironment {
    /// Process-wide configuration.
    pub config: RouterConfig,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
    /// Keystore collaborator.
    pub keystore: Arc<dyn KeystoreProvider>,
    /// Transaction persistence collaborator.
    pub transactions: Arc<dyn TransactionStore>,
    /// Event sink collaborator.
    pub events: Arc<dyn EventSink>,
    /// Bus producer pool collaborator.
    pub producers: Arc<dyn ProducerPool>,
}

impl RouterEnvironment {
    /// Bundle the collaborators with the given configuration and the system
    /// clock.
    #[must_use]
    pub fn new(
        config: RouterConfig,
        keystore: Arc<dyn KeystoreProvider>,
        transactions: Arc<dyn TransactionStore>,
        events: Arc<dyn EventSink>,
        producers: Arc<dyn ProducerPool>,
    ) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            keystore,
            transactions,
            events,
            producers,
        }
    }

    /// Replace the clock (tests pin time with a fixed clock).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
