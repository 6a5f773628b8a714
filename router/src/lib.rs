//! # HIE Router
//!
//! The transaction routing engine of a health-information exchange
//! interoperability layer.
//!
//! Given a request that has already been authenticated and bound to a
//! channel, the engine fans it out to the channel's routes, designates the
//! single primary route's response as the client-visible response, collects
//! secondary route outcomes asynchronously for auditing, and produces
//! orchestration records describing what happened.
//!
//! ## Dispatch shape
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  RequestContext │  preflight: primaries ≤ 1,   │
//!  ─────────────► │  timeout inheritance,        │
//!                 │  keystore acquisition        │
//!                 └──────────────┬───────────────┘
//!                                ▼
//!                 wave A: primary + eager secondaries (concurrent)
//!                                │  primary settles → response adapted,
//!                                │  continuation fired exactly once
//!                                ▼
//!                 wave B: wait-for-primary secondaries, gated on the
//!                         primary's status code (concurrent)
//!                                ▼
//!                 finalize: final transaction status, route events
//! ```
//!
//! Transports return values; only the dispatcher mutates the context.
//! Collaborators (keystore, transaction store, event sink, producer pool)
//! are injected through [`hie_router_core::RouterEnvironment`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod middleware;
pub mod options;
pub mod recorder;
pub mod response;
pub mod transform;
pub mod transport;

pub use dispatch::{dispatch, status_code_matches};
pub use middleware::{is_method_allowed, middleware, route};
pub use options::{build_options, BasicAuth, BusOptions, HttpOptions, InboundRequest, OutboundRequest};
