//! Audit records produced by a dispatch.
//!
//! The primary route's attempts are traced as [`Orchestration`] entries on
//! the request context; every non-primary attempt becomes a [`RouteRecord`]
//! persisted for later inspection. Both shapes are also what mediator-framed
//! responses embed, so they deserialize from mediator JSON as well.

use crate::headers::Headers;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{message, stack?}` as carried by every error surfaced in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Human-readable error message.
    pub message: String,
    /// Error cause chain, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorDetails {
    /// Build details from an error, folding its source chain into `stack`.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            stack: if chain.is_empty() {
                None
            } else {
                Some(chain.join("\ncaused by: "))
            },
        }
    }
}

/// The outbound request as captured for auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    /// Destination host, absent for bus routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Destination port, absent for bus routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Effective outbound path (after transformation, with query string).
    pub path: String,
    /// Outbound headers.
    #[serde(default)]
    pub headers: Headers,
    /// HTTP method.
    pub method: String,
    /// Request body rendered as a string, when one was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// When the outbound request was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A downstream response as captured for auditing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedResponse {
    /// Response status code.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Response body rendered as a string.
    #[serde(default)]
    pub body: String,
    /// When the response completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A structured trace entry for a primary-route attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orchestration {
    /// Route (or mediator-assigned step) name.
    pub name: String,
    /// The outbound request.
    pub request: OrchestrationRequest,
    /// The downstream response, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<RecordedResponse>,
    /// The failure, on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// A per-attempt record for a non-primary route, persisted for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    /// Route name.
    pub name: String,
    /// The outbound request, when one was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<OrchestrationRequest>,
    /// The downstream response, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<RecordedResponse>,
    /// The failure, on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// URN of the mediator that produced the response, for mediator-framed
    /// secondary responses.
    #[serde(rename = "mediatorURN", default, skip_serializing_if = "Option::is_none")]
    pub mediator_urn: Option<String>,
    /// Orchestrations lifted from a mediator-framed response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orchestrations: Vec<Orchestration>,
    /// Properties lifted from a mediator-framed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Metrics lifted from a mediator-framed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

impl RouteRecord {
    /// A record carrying only the route name, the shape used before the
    /// attempt outcome is known.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: None,
            response: None,
            error: None,
            mediator_urn: None,
            orchestrations: Vec::new(),
            properties: None,
            metrics: None,
        }
    }
}

/// A primary or secondary response framed by a mediator
/// (`content-type: application/json+openhim`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediatorResponse {
    /// The embedded response the client-visible response is adapted from.
    pub response: MediatorInner,
    /// Error reported by the mediator. Sets the transaction error and marks
    /// it for automatic retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// URN identifying the mediator.
    #[serde(
        rename = "x-mediator-urn",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mediator_urn: Option<String>,
    /// Orchestrations the mediator performed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrations: Option<Vec<Orchestration>>,
    /// Free-form properties attached by the mediator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Metrics attached by the mediator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

/// The response object embedded in a mediator frame.
///
/// The status arrives as JSON and may be a number or a numeric string; the
/// response adapter decides how to interpret it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediatorInner {
    /// Response status, number or numeric string.
    pub status: Value,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Response body.
    #[serde(default)]
    pub body: Option<String>,
    /// Response timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
