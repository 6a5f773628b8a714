//! # HIE Router Core
//!
//! Core types and collaborator traits for the transaction routing engine of a
//! health-information exchange interoperability layer.
//!
//! This crate provides the fundamental abstractions the router is built on:
//!
//! - **Channel / Route**: the routing policy bound to an authenticated request
//!   and the downstream destinations it fans out to
//! - **RequestContext**: the per-transaction mutable bundle threaded through
//!   the request pipeline
//! - **Records**: orchestration and secondary-route records persisted for
//!   auditing
//! - **Collaborator traits**: the contracts with the persistence store, the
//!   event sink, the keystore, and the message-bus producer pool
//!
//! ## Architecture Principles
//!
//! - The routing engine (in the `hie-router` crate) owns all mutation of the
//!   request context; collaborators and transports return values
//! - Collaborator traits are dyn-compatible (`Pin<Box<dyn Future>>` returns)
//!   so they can be injected as `Arc<dyn Trait>` through [`environment::RouterEnvironment`]
//! - Production implementations live in their own crates; in-memory mocks for
//!   testing live in `hie-router-testing`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod events;
pub mod headers;
pub mod keystore;
pub mod producer;
pub mod records;
pub mod store;

pub use channel::{BusTarget, Channel, HttpTarget, Route, RouteStatus, RouteTarget};
pub use config::RouterConfig;
pub use context::{ContextResponse, CookieOptions, RequestContext, Response, SetCookie};
pub use environment::{Clock, RouterEnvironment, SystemClock};
pub use error::{BusError, EventError, KeystoreError, RouterError, StoreError};
pub use events::{create_secondary_route_events, EventSink, RouteEvent};
pub use headers::{HeaderValue, Headers};
pub use keystore::{CertEntry, Keystore, KeystoreProvider};
pub use producer::{BusProducer, ProducerKey, ProducerPool, PublishAck};
pub use records::{
    ErrorDetails, MediatorInner, MediatorResponse, Orchestration, OrchestrationRequest,
    RecordedResponse, RouteRecord,
};
pub use store::TransactionStore;
