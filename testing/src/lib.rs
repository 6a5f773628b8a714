//! # HIE Router Testing
//!
//! Testing utilities for the routing engine:
//!
//! - In-memory mock implementations of every collaborator trait
//! - A fixed clock for deterministic timestamps
//! - A ready-made [`TestEnvironment`] bundling the mocks with inspection
//!   handles
//!
//! ## Example
//!
//! ```ignore
//! use hie_router_testing::environment;
//!
//! #[tokio::test]
//! async fn dispatch_persists_secondaries() {
//!     let test = environment();
//!     hie_router::dispatch(&mut ctx, &test.env, |_| {}).await;
//!     assert_eq!(test.transactions.records().len(), 1);
//! }
//! ```

#![forbid(unsafe_code)]

pub mod mocks;

use hie_router_core::{RouterConfig, RouterEnvironment};
use mocks::{CapturingProducerPool, MemoryEventSink, MemoryTransactionStore, StaticKeystoreProvider};
use std::sync::Arc;

/// A [`RouterEnvironment`] wired to in-memory mocks, with handles for
/// inspecting what the engine persisted, emitted, and published.
pub struct TestEnvironment {
    /// The environment to hand to the engine.
    pub env: RouterEnvironment,
    /// Transaction store handle.
    pub transactions: Arc<MemoryTransactionStore>,
    /// Event sink handle.
    pub events: Arc<MemoryEventSink>,
    /// Producer pool handle.
    pub producers: Arc<CapturingProducerPool>,
}

/// Build a test environment with the default configuration.
#[must_use]
pub fn environment() -> TestEnvironment {
    environment_with(RouterConfig::default())
}

/// Build a test environment with the given configuration.
#[must_use]
pub fn environment_with(config: RouterConfig) -> TestEnvironment {
    let transactions = Arc::new(MemoryTransactionStore::new());
    let events = Arc::new(MemoryEventSink::new());
    let producers = Arc::new(CapturingProducerPool::new());
    let keystore = Arc::new(StaticKeystoreProvider::new(mocks::test_keystore()));

    let env = RouterEnvironment::new(
        config,
        keystore,
        Arc::clone(&transactions) as Arc<dyn hie_router_core::TransactionStore>,
        Arc::clone(&events) as Arc<dyn hie_router_core::EventSink>,
        Arc::clone(&producers) as Arc<dyn hie_router_core::ProducerPool>,
    );

    TestEnvironment {
        env,
        transactions,
        events,
        producers,
    }
}
