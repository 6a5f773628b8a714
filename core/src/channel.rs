//! Channels and routes: the routing policy bound to an inbound request.
//!
//! A **channel** is the policy the authentication layer resolved for the
//! request: an ordered set of downstream **routes**, an optional method
//! allow-list, and an optional channel-wide timeout inherited by routes that
//! do not set their own. Exactly one enabled route per channel is the
//! *primary* whose response becomes the client-visible response; the rest are
//! secondaries dispatched for auditing.
//!
//! Wire names follow the interoperability layer's JSON conventions
//! (camelCase, `type` tag on the transport locator).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// The routing policy bound to an authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Channel identifier, as assigned by the configuration store.
    #[serde(default)]
    pub id: String,
    /// Channel name, unique across the deployment.
    pub name: String,
    /// URL pattern the channel matched on. Opaque to the router; forwarded
    /// verbatim in bus envelopes.
    #[serde(default)]
    pub url_pattern: String,
    /// Method allow-list. Empty means every method is allowed.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Channel-wide timeout in milliseconds, inherited by routes without one.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Downstream routes, in configuration order.
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl Channel {
    /// Create a channel with the given name and no routes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            url_pattern: String::new(),
            methods: Vec::new(),
            timeout: None,
            routes: Vec::new(),
        }
    }

    /// Set the channel identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the matched URL pattern.
    #[must_use]
    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = pattern.into();
        self
    }

    /// Set the method allow-list.
    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Set the channel-wide timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    /// Set the routes.
    #[must_use]
    pub fn with_routes(mut self, routes: Vec<Route>) -> Self {
        self.routes = routes;
        self
    }

    /// Iterate the enabled routes.
    pub fn enabled_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.is_enabled())
    }
}

/// Whether a route participates in dispatch. A missing status on the wire
/// means enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    /// The route is dispatched.
    #[default]
    Enabled,
    /// The route is never contacted, never recorded, never counted.
    Disabled,
}

/// Transport locator for a route: a closed sum over the supported transports.
///
/// The dispatch engine never branches on the variant itself; only the option
/// builder and the transport adapters do.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteTarget {
    /// An HTTP or HTTPS destination.
    Http(HttpTarget),
    /// A message-bus topic.
    Bus(BusTarget),
}

// Hand-written so a route with no `type` field reads as an HTTP route, which
// the tagged derive cannot express.
impl<'de> Deserialize<'de> for RouteTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("http")
            .to_string();
        match kind.as_str() {
            "http" => HttpTarget::deserialize(value)
                .map(Self::Http)
                .map_err(D::Error::custom),
            "bus" => BusTarget::deserialize(value)
                .map(Self::Bus)
                .map_err(D::Error::custom),
            other => Err(D::Error::unknown_variant(other, &["http", "bus"])),
        }
    }
}

/// Locator for an HTTP(S) destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTarget {
    /// Destination host.
    pub host: String,
    /// Destination port.
    pub port: u16,
    /// Use TLS.
    #[serde(default)]
    pub secured: bool,
    /// Literal replacement path. Ignored when `path_transform` is set.
    #[serde(default)]
    pub path: Option<String>,
    /// Sed-like `s/from/to[/g]` expression applied to the inbound path.
    #[serde(default)]
    pub path_transform: Option<String>,
    /// Per-route timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Locator for a message-bus topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusTarget {
    /// Topic the request envelope is published to.
    pub topic: String,
    /// Client id the producer pool keys producers by.
    pub client_id: String,
    /// Per-route timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// One downstream destination under a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route name, unique within the channel. Required for recording.
    pub name: String,
    /// Enabled or disabled.
    #[serde(default)]
    pub status: RouteStatus,
    /// Whether this route's response becomes the client-visible response.
    /// At most one enabled route per channel may set this.
    #[serde(default)]
    pub primary: bool,
    /// Transport locator.
    #[serde(flatten)]
    pub target: RouteTarget,
    /// Name of a CA entry in the keystore to pin for TLS verification.
    #[serde(default)]
    pub cert: Option<String>,
    /// Basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// Forward the inbound `authorization` header downstream.
    #[serde(default)]
    pub forward_auth_header: bool,
    /// Defer this (non-primary) route until the primary has resolved, then
    /// gate it on `status_codes_check`.
    #[serde(default)]
    pub wait_primary_response: bool,
    /// Comma-separated status codes and `N*` wildcards gating a
    /// wait-for-primary route.
    #[serde(default)]
    pub status_codes_check: Option<String>,
}

impl Route {
    /// Create an enabled, non-primary HTTP route.
    #[must_use]
    pub fn http(name: impl Into<String>, target: HttpTarget) -> Self {
        Self::with_target(name, RouteTarget::Http(target))
    }

    /// Create an enabled, non-primary bus route.
    #[must_use]
    pub fn bus(name: impl Into<String>, target: BusTarget) -> Self {
        Self::with_target(name, RouteTarget::Bus(target))
    }

    fn with_target(name: impl Into<String>, target: RouteTarget) -> Self {
        Self {
            name: name.into(),
            status: RouteStatus::Enabled,
            primary: false,
            target,
            cert: None,
            username: None,
            password: None,
            forward_auth_header: false,
            wait_primary_response: false,
            status_codes_check: None,
        }
    }

    /// Mark this route as the channel's primary.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Disable the route.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.status = RouteStatus::Disabled;
        self
    }

    /// Defer dispatch until the primary has resolved.
    #[must_use]
    pub const fn wait_for_primary(mut self) -> Self {
        self.wait_primary_response = true;
        self
    }

    /// Gate a wait-for-primary route on the given status-code check.
    #[must_use]
    pub fn with_status_codes_check(mut self, check: impl Into<String>) -> Self {
        self.status_codes_check = Some(check.into());
        self
    }

    /// Pin TLS verification to the named keystore CA entry.
    #[must_use]
    pub fn with_cert(mut self, ca_name: impl Into<String>) -> Self {
        self.cert = Some(ca_name.into());
        self
    }

    /// Send basic-auth credentials downstream.
    #[must_use]
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Forward the inbound `authorization` header downstream.
    #[must_use]
    pub const fn forwarding_auth_header(mut self) -> Self {
        self.forward_auth_header = true;
        self
    }

    /// Whether the route participates in dispatch.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.status == RouteStatus::Enabled
    }

    /// The route's own timeout, if configured.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        let millis = match &self.target {
            RouteTarget::Http(t) => t.timeout,
            RouteTarget::Bus(t) => t.timeout,
        };
        match millis {
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        }
    }

    /// Write a timeout onto the route (used for channel-timeout inheritance).
    pub fn set_timeout(&mut self, millis: u64) {
        match &mut self.target {
            RouteTarget::Http(t) => t.timeout = Some(millis),
            RouteTarget::Bus(t) => t.timeout = Some(millis),
        }
    }
}

impl HttpTarget {
    /// Create a plaintext HTTP target with no path rewriting.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secured: false,
            path: None,
            path_transform: None,
            timeout: None,
        }
    }

    /// Use TLS for this target.
    #[must_use]
    pub const fn secured(mut self) -> Self {
        self.secured = true;
        self
    }

    /// Replace the inbound path with a literal path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Rewrite the inbound path with a `s/from/to[/g]` expression.
    #[must_use]
    pub fn with_path_transform(mut self, expression: impl Into<String>) -> Self {
        self.path_transform = Some(expression.into());
        self
    }

    /// Set the per-route timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }
}

impl BusTarget {
    /// Create a bus target.
    #[must_use]
    pub fn new(topic: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            client_id: client_id.into(),
            timeout: None,
        }
    }

    /// Set the per-route timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_deserializes_from_wire_shape() {
        let route: Route = serde_json::from_str(
            r#"{
                "name": "clinical store",
                "type": "http",
                "host": "records.local",
                "port": 8080,
                "secured": true,
                "pathTransform": "s/old/new",
                "primary": true,
                "forwardAuthHeader": true
            }"#,
        )
        .unwrap();

        assert!(route.primary);
        assert!(route.forward_auth_header);
        assert!(route.is_enabled(), "missing status means enabled");
        match &route.target {
            RouteTarget::Http(t) => {
                assert_eq!(t.host, "records.local");
                assert_eq!(t.port, 8080);
                assert!(t.secured);
                assert_eq!(t.path_transform.as_deref(), Some("s/old/new"));
            }
            RouteTarget::Bus(_) => panic!("expected an http target"),
        }
    }

    #[test]
    fn bus_route_deserializes_from_wire_shape() {
        let route: Route = serde_json::from_str(
            r#"{
                "name": "audit feed",
                "type": "bus",
                "topic": "audit",
                "clientId": "audit-client",
                "waitPrimaryResponse": true,
                "statusCodesCheck": "2*,404"
            }"#,
        )
        .unwrap();

        assert!(route.wait_primary_response);
        assert_eq!(route.status_codes_check.as_deref(), Some("2*,404"));
        match &route.target {
            RouteTarget::Bus(t) => {
                assert_eq!(t.topic, "audit");
                assert_eq!(t.client_id, "audit-client");
            }
            RouteTarget::Http(_) => panic!("expected a bus target"),
        }
    }

    #[test]
    fn a_route_without_a_type_is_http() {
        let route: Route = serde_json::from_str(
            r#"{"name": "legacy", "host": "records.local", "port": 8080}"#,
        )
        .unwrap();

        assert!(matches!(route.target, RouteTarget::Http(_)));
    }

    #[test]
    fn an_unknown_type_is_rejected() {
        let parsed: Result<Route, _> = serde_json::from_str(
            r#"{"name": "odd", "type": "carrier-pigeon", "host": "h", "port": 1}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn disabled_status_round_trips() {
        let route = Route::http("r", HttpTarget::new("h", 80)).disabled();
        let json = serde_json::to_string(&route).unwrap();
        let back: Route = serde_json::from_str(&json).unwrap();
        assert!(!back.is_enabled());
    }

    #[test]
    fn timeout_inheritance_writes_through() {
        let mut route = Route::http("r", HttpTarget::new("h", 80));
        assert_eq!(route.timeout(), None);

        route.set_timeout(2500);
        assert_eq!(route.timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn enabled_routes_skips_disabled() {
        let channel = Channel::new("c").with_routes(vec![
            Route::http("a", HttpTarget::new("h", 80)),
            Route::http("b", HttpTarget::new("h", 81)).disabled(),
        ]);
        let names: Vec<&str> = channel.enabled_routes().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }
}
