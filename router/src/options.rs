//! Outbound request descriptors, composed per route from the inbound
//! context, the route configuration, and the keystore.

use crate::transform;
use bytes::Bytes;
use hie_router_core::{
    Headers, HttpTarget, Keystore, KeystoreError, RequestContext, Route, RouteTarget, RouterConfig,
    RouterError,
};
use std::time::Duration;

/// Basic-auth credentials attached to an outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Descriptor for one outbound HTTP(S) request.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Destination host.
    pub hostname: String,
    /// Destination port.
    pub port: u16,
    /// Use TLS. Certificate verification is always on.
    pub secured: bool,
    /// HTTP method, copied from the inbound request.
    pub method: String,
    /// Effective outbound path, query string included.
    pub path: String,
    /// Outbound headers.
    pub headers: Headers,
    /// Transport timeout.
    pub timeout: Duration,
    /// Client private key, PEM.
    pub key: String,
    /// Client certificate, PEM.
    pub cert: String,
    /// Pinned CA, PEM, when the route references a keystore CA entry.
    pub ca: Option<String>,
    /// Basic-auth credentials, when the route configures them.
    pub auth: Option<BasicAuth>,
}

/// Descriptor for one bus publication.
#[derive(Debug, Clone)]
pub struct BusOptions {
    /// Broker endpoints.
    pub brokers: Vec<String>,
    /// Destination topic.
    pub topic: String,
    /// Client id the producer pool keys producers by.
    pub client_id: String,
    /// Publish timeout.
    pub timeout: Duration,
}

/// The outbound descriptor: a closed sum the transport layer dispatches on.
/// The dispatch engine itself never branches on the variant.
#[derive(Debug, Clone)]
pub enum OutboundRequest {
    /// An HTTP(S) request.
    Http(HttpOptions),
    /// A bus publication.
    Bus(BusOptions),
}

/// The inbound request data a transport needs, detached from the request
/// context so transport futures can run while the dispatcher appends records.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Inbound method.
    pub method: String,
    /// Inbound URL: path plus query string.
    pub url: String,
    /// Inbound headers.
    pub headers: Headers,
    /// Inbound body.
    pub body: Bytes,
    /// Name of the authorised channel.
    pub channel_name: String,
    /// URL pattern the channel matched on.
    pub url_pattern: String,
}

impl InboundRequest {
    /// Snapshot the transport-relevant inbound data out of a context.
    #[must_use]
    pub fn from_context(ctx: &RequestContext) -> Self {
        Self {
            method: ctx.method.clone(),
            url: ctx.url(),
            headers: ctx.headers.clone(),
            body: ctx.body.clone(),
            channel_name: ctx.authorised_channel.name.clone(),
            url_pattern: ctx.authorised_channel.url_pattern.clone(),
        }
    }
}

/// Compose the outbound descriptor for one route.
///
/// Inbound headers are copied with `host` removed, and `authorization`
/// removed too unless the route forwards it. The query string, when present,
/// is appended to the effective path.
///
/// # Errors
///
/// Returns [`RouterError::InvalidPathTransform`](hie_router_core::RouterError)
/// for a malformed path expression, or a keystore error when the route pins a
/// CA entry the keystore does not hold. Both flow through the per-route error
/// channel, like a transport failure.
pub fn build_options(
    ctx: &RequestContext,
    route: &Route,
    keystore: &Keystore,
    config: &RouterConfig,
) -> Result<OutboundRequest, RouterError> {
    let timeout = route.timeout().unwrap_or(config.timeout);

    match &route.target {
        RouteTarget::Http(target) => {
            Ok(OutboundRequest::Http(build_http(ctx, route, target, keystore, timeout)?))
        }
        RouteTarget::Bus(target) => Ok(OutboundRequest::Bus(BusOptions {
            brokers: config.kafka_brokers.clone(),
            topic: target.topic.clone(),
            client_id: target.client_id.clone(),
            timeout,
        })),
    }
}

fn build_http(
    ctx: &RequestContext,
    route: &Route,
    target: &HttpTarget,
    keystore: &Keystore,
    timeout: Duration,
) -> Result<HttpOptions, RouterError> {
    let mut headers = ctx.headers.clone();
    headers.remove("host");
    if !route.forward_auth_header {
        headers.remove("authorization");
    }

    let mut path = transform::effective_path(&ctx.path, target)?;
    if !ctx.querystring.is_empty() {
        path = format!("{path}?{}", ctx.querystring);
    }

    let ca = match &route.cert {
        Some(id) => Some(
            keystore
                .ca_entry(id)
                .ok_or_else(|| KeystoreError::MissingCa(id.clone()))?
                .data
                .clone(),
        ),
        None => None,
    };

    let auth = match (&route.username, &route.password) {
        (Some(username), Some(password)) => Some(BasicAuth {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    Ok(HttpOptions {
        hostname: target.host.clone(),
        port: target.port,
        secured: target.secured,
        method: ctx.method.clone(),
        path,
        headers,
        timeout,
        key: keystore.key.clone(),
        cert: keystore.cert.data.clone(),
        ca,
        auth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hie_router_core::{CertEntry, Channel, RouterError};

    fn keystore() -> Keystore {
        Keystore {
            key: "KEY".to_string(),
            cert: CertEntry::new("client", "CERT"),
            ca: vec![CertEntry::new("upstream", "CA-DATA")],
        }
    }

    fn context() -> RequestContext {
        RequestContext::new(Channel::new("labs"), "GET", "/fhir/Patient").with_headers(
            [
                ("Host", "hie.example.org"),
                ("Authorization", "Basic aW46Ym91bmQ="),
                ("X-Request-Source", "clinic-7"),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn http_route() -> Route {
        Route::http("upstream", HttpTarget::new("records.local", 8080))
    }

    fn unwrap_http(outbound: OutboundRequest) -> HttpOptions {
        match outbound {
            OutboundRequest::Http(opts) => opts,
            OutboundRequest::Bus(_) => panic!("expected http options"),
        }
    }

    #[test]
    fn host_and_authorization_headers_are_stripped() {
        let opts = unwrap_http(
            build_options(&context(), &http_route(), &keystore(), &RouterConfig::default())
                .unwrap(),
        );

        assert!(!opts.headers.contains("host"));
        assert!(!opts.headers.contains("authorization"));
        assert_eq!(opts.headers.get("x-request-source"), Some("clinic-7"));
    }

    #[test]
    fn authorization_is_kept_when_the_route_forwards_it() {
        let route = http_route().forwarding_auth_header();
        let opts = unwrap_http(
            build_options(&context(), &route, &keystore(), &RouterConfig::default()).unwrap(),
        );

        assert_eq!(
            opts.headers.get("authorization"),
            Some("Basic aW46Ym91bmQ=")
        );
    }

    #[test]
    fn querystring_is_appended_to_the_path() {
        let ctx = context().with_querystring("name=smith&active=true");
        let opts = unwrap_http(
            build_options(&ctx, &http_route(), &keystore(), &RouterConfig::default()).unwrap(),
        );

        assert_eq!(opts.path, "/fhir/Patient?name=smith&active=true");
    }

    #[test]
    fn keystore_material_is_attached() {
        let route = http_route().with_cert("upstream");
        let opts = unwrap_http(
            build_options(&context(), &route, &keystore(), &RouterConfig::default()).unwrap(),
        );

        assert_eq!(opts.key, "KEY");
        assert_eq!(opts.cert, "CERT");
        assert_eq!(opts.ca.as_deref(), Some("CA-DATA"));
    }

    #[test]
    fn missing_ca_entry_is_a_per_route_error() {
        let route = http_route().with_cert("unknown");
        let err = build_options(&context(), &route, &keystore(), &RouterConfig::default())
            .unwrap_err();

        assert!(matches!(
            err,
            RouterError::Keystore(KeystoreError::MissingCa(_))
        ));
    }

    #[test]
    fn credentials_require_both_username_and_password() {
        let route = http_route().with_basic_auth("svc", "secret");
        let opts = unwrap_http(
            build_options(&context(), &route, &keystore(), &RouterConfig::default()).unwrap(),
        );
        assert_eq!(
            opts.auth,
            Some(BasicAuth {
                username: "svc".to_string(),
                password: "secret".to_string()
            })
        );

        let mut route = http_route();
        route.username = Some("svc".to_string());
        let opts = unwrap_http(
            build_options(&context(), &route, &keystore(), &RouterConfig::default()).unwrap(),
        );
        assert_eq!(opts.auth, None);
    }

    #[test]
    fn route_timeout_wins_over_the_default() {
        let mut route = http_route();
        route.set_timeout(1500);
        let opts = unwrap_http(
            build_options(&context(), &route, &keystore(), &RouterConfig::default()).unwrap(),
        );
        assert_eq!(opts.timeout, Duration::from_millis(1500));

        let opts = unwrap_http(
            build_options(&context(), &http_route(), &keystore(), &RouterConfig::default())
                .unwrap(),
        );
        assert_eq!(opts.timeout, Duration::from_secs(60));
    }

    #[test]
    fn bus_routes_carry_brokers_and_topic() {
        let config = RouterConfig::default().with_kafka_brokers(["broker-1:9092", "broker-2:9092"]);
        let route = Route::bus("audit", hie_router_core::BusTarget::new("audit", "audit-client"));

        match build_options(&context(), &route, &keystore(), &config).unwrap() {
            OutboundRequest::Bus(opts) => {
                assert_eq!(opts.brokers, vec!["broker-1:9092", "broker-2:9092"]);
                assert_eq!(opts.topic, "audit");
                assert_eq!(opts.client_id, "audit-client");
            }
            OutboundRequest::Http(_) => panic!("expected bus options"),
        }
    }
}
