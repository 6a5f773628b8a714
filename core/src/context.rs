//! The per-transaction request context threaded through the pipeline.
//!
//! The context is created upstream once the request has been authenticated
//! and bound to a channel, mutated by the routing engine (it is single-owner:
//! only the dispatcher task writes to it), read by the persistence
//! collaborator after dispatch completes, and destroyed when the pipeline
//! ends.

use crate::channel::Channel;
use crate::headers::Headers;
use crate::records::{ErrorDetails, MediatorResponse, Orchestration, RouteRecord};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// A downstream response as returned by a transport adapter.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body. Decompressed bodies are re-encoded as UTF-8; raw bodies
    /// are the bytes as received.
    pub body: Bytes,
    /// Response-end time.
    pub timestamp: DateTime<Utc>,
}

/// Cookie options recognised when translating `set-cookie` headers onto the
/// outer response.
///
/// This is a closed record: names outside the reserved set are cookie
/// name/value pairs, never option overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// `max-age`, seconds.
    pub max_age: Option<i64>,
    /// `expires`, as an HTTP date.
    pub expires: Option<DateTime<Utc>>,
    /// `path`.
    pub path: Option<String>,
    /// `domain`.
    pub domain: Option<String>,
    /// `secure` flag.
    pub secure: bool,
    /// `signed` flag.
    pub signed: bool,
    /// `overwrite` flag, true only for the literal string `"true"`.
    pub overwrite: bool,
    /// `httponly` flag.
    pub http_only: bool,
}

/// One cookie to set on the outer response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Options collected from the same `set-cookie` header.
    pub options: CookieOptions,
}

/// The client-visible response under assembly.
///
/// The outer pipeline framework serializes this once the routing engine has
/// signalled primary completion; `content-length`, `content-encoding` and
/// `transfer-encoding` are re-derived there, which is why the response
/// adapter drops them.
#[derive(Debug, Clone)]
pub struct ContextResponse {
    /// Status code. Defaults to 404 until a handler claims the request.
    pub status: u16,
    /// Pass-through headers.
    pub headers: Headers,
    /// Response body.
    pub body: Bytes,
    /// Response timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Content type, when the downstream response carried one.
    pub content_type: Option<String>,
    /// Redirect target, when the downstream response was a 3xx with a
    /// `location` header.
    pub redirect: Option<String>,
    /// Cookies to set.
    pub cookies: Vec<SetCookie>,
}

impl Default for ContextResponse {
    fn default() -> Self {
        Self {
            status: 404,
            headers: Headers::new(),
            body: Bytes::new(),
            timestamp: None,
            content_type: None,
            redirect: None,
            cookies: Vec::new(),
        }
    }
}

/// Per-transaction mutable bundle threaded through the pipeline.
#[derive(Debug)]
pub struct RequestContext {
    /// Transaction identifier assigned by the persistence layer.
    pub transaction_id: String,
    /// When the inbound request was received.
    pub request_timestamp: DateTime<Utc>,
    /// Which attempt this is, for auto-retried transactions.
    pub current_attempt: u32,
    /// Inbound method.
    pub method: String,
    /// Inbound path, without the query string.
    pub path: String,
    /// Inbound query string, empty when absent.
    pub querystring: String,
    /// Inbound headers.
    pub headers: Headers,
    /// Inbound body.
    pub body: Bytes,
    /// The channel the request was authorised against.
    pub authorised_channel: Channel,
    /// The client-visible response under assembly.
    pub response: ContextResponse,
    /// Parsed mediator frame, when the primary response carried one.
    pub mediator_response: Option<MediatorResponse>,
    /// Transaction error, set on primary failure or mediator error.
    pub error: Option<ErrorDetails>,
    /// Marks the transaction for automatic retry by the pipeline.
    pub auto_retry: bool,
    /// Name of the primary route once it has resolved.
    pub primary_route: Option<String>,
    /// Trace entries for the primary route.
    pub orchestrations: Vec<Orchestration>,
    /// Records for non-primary routes, in resolve order.
    pub routes: Vec<RouteRecord>,
    /// Dispatch start time.
    pub timer: Option<Instant>,
}

impl RequestContext {
    /// Create a context for an authorised request.
    #[must_use]
    pub fn new(
        authorised_channel: Channel,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: String::new(),
            request_timestamp: Utc::now(),
            current_attempt: 1,
            method: method.into(),
            path: path.into(),
            querystring: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
            authorised_channel,
            response: ContextResponse::default(),
            mediator_response: None,
            error: None,
            auto_retry: false,
            primary_route: None,
            orchestrations: Vec::new(),
            routes: Vec::new(),
            timer: None,
        }
    }

    /// Set the transaction identifier.
    #[must_use]
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = id.into();
        self
    }

    /// Set the inbound query string.
    #[must_use]
    pub fn with_querystring(mut self, querystring: impl Into<String>) -> Self {
        self.querystring = querystring.into();
        self
    }

    /// Set the inbound headers.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Set the inbound body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The inbound URL: path plus query string.
    #[must_use]
    pub fn url(&self) -> String {
        if self.querystring.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.querystring)
        }
    }
}
