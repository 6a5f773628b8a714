//! Route lifecycle events emitted after a dispatch completes.
//!
//! Once every secondary route has been persisted, the engine builds one
//! `end` event per secondary route record and hands the buffer to the
//! [`EventSink`] collaborator. Event failures are logged, never surfaced.

use crate::channel::Channel;
use crate::error::EventError;
use crate::records::RouteRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One route lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEvent {
    /// Channel the route belongs to.
    pub channel_id: String,
    /// Transaction the route ran under.
    pub transaction_id: String,
    /// Request timestamp the event is grouped by.
    pub normalized_timestamp: DateTime<Utc>,
    /// Event subject, always `"route"` for secondary-route events.
    #[serde(rename = "type")]
    pub kind: String,
    /// Lifecycle phase, always `"end"` for settled routes.
    pub event: String,
    /// Route name.
    pub name: String,
    /// Response status, absent when the route failed without a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Normalized outcome: `success`, `completed`, or `error`.
    pub status_type: String,
    /// Mediator URN, for mediator-framed responses.
    #[serde(rename = "mediatorURN", default, skip_serializing_if = "Option::is_none")]
    pub mediator_urn: Option<String>,
    /// Which dispatch attempt produced the event.
    pub attempt: u32,
}

/// Normalize a status code into an event outcome.
#[must_use]
pub const fn status_type(status: u16) -> &'static str {
    if status >= 500 {
        "error"
    } else if status >= 400 {
        "completed"
    } else {
        "success"
    }
}

/// Append one `end` event per secondary route record to `buf`.
pub fn create_secondary_route_events(
    buf: &mut Vec<RouteEvent>,
    transaction_id: &str,
    request_timestamp: DateTime<Utc>,
    channel: &Channel,
    routes: &[RouteRecord],
    attempt: u32,
) {
    for record in routes {
        let status = record.response.as_ref().map(|r| r.status);
        buf.push(RouteEvent {
            channel_id: channel.id.clone(),
            transaction_id: transaction_id.to_string(),
            normalized_timestamp: request_timestamp,
            kind: "route".to_string(),
            event: "end".to_string(),
            name: record.name.clone(),
            status,
            status_type: status.map_or("error", status_type).to_string(),
            mediator_urn: record.mediator_urn.clone(),
            attempt,
        });
    }
}

/// Sink for route lifecycle events.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// sink can be injected as `Arc<dyn EventSink>`.
pub trait EventSink: Send + Sync {
    /// Persist a buffer of events.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] when the write fails; the engine logs and
    /// continues.
    fn save_events(
        &self,
        events: Vec<RouteEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + '_>>;
}
