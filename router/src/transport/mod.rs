//! Transport adapters: one outbound attempt per route.
//!
//! Adapters take the outbound descriptor and the detached inbound snapshot
//! and return a [`Response`] or fail; they never touch the request context.

use crate::options::{InboundRequest, OutboundRequest};
use hie_router_core::{Response, RouterEnvironment, RouterError};

pub mod bus;
pub mod http;
pub mod kafka;

pub use kafka::KafkaProducerPool;

/// Send one outbound request over the transport its descriptor names.
///
/// # Errors
///
/// Returns the adapter's transport, TLS, publish, or timeout error. No
/// partial response is ever returned.
pub async fn send(
    outbound: &OutboundRequest,
    inbound: &InboundRequest,
    env: &RouterEnvironment,
) -> Result<Response, RouterError> {
    match outbound {
        OutboundRequest::Http(opts) => http::send(opts, inbound, env.clock.as_ref()).await,
        OutboundRequest::Bus(opts) => {
            bus::send(opts, inbound, env.producers.as_ref(), env.clock.as_ref()).await
        }
    }
}
