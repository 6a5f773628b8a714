//! Orchestration and secondary-route record building.
//!
//! The primary route's attempts are traced onto `ctx.orchestrations`; every
//! non-primary attempt becomes a [`RouteRecord`] appended to `ctx.routes` and
//! handed to the persistence collaborator. Mediator-framed secondary
//! responses have their URN, orchestrations, properties and metrics lifted
//! into the record.

use crate::options::{InboundRequest, OutboundRequest};
use crate::response;
use chrono::{DateTime, Utc};
use hie_router_core::{
    ErrorDetails, MediatorResponse, Orchestration, OrchestrationRequest, RecordedResponse,
    RequestContext, Response, RouteRecord, RouterError,
};

/// Capture the outbound request for auditing. Bus routes record the inbound
/// request they enveloped; HTTP routes record the effective outbound form.
#[must_use]
pub fn request_summary(
    inbound: &InboundRequest,
    outbound: &OutboundRequest,
    started: DateTime<Utc>,
) -> OrchestrationRequest {
    let body = if inbound.body.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&inbound.body).into_owned())
    };

    match outbound {
        OutboundRequest::Http(opts) => OrchestrationRequest {
            host: Some(opts.hostname.clone()),
            port: Some(opts.port.to_string()),
            path: opts.path.clone(),
            headers: opts.headers.clone(),
            method: opts.method.clone(),
            body,
            timestamp: Some(started),
        },
        OutboundRequest::Bus(_) => OrchestrationRequest {
            host: None,
            port: None,
            path: inbound.url.clone(),
            headers: inbound.headers.clone(),
            method: inbound.method.clone(),
            body,
            timestamp: Some(started),
        },
    }
}

/// Append the primary route's attempt to the context's orchestration trace.
pub fn record_primary_attempt(
    ctx: &mut RequestContext,
    route_name: &str,
    request: OrchestrationRequest,
    outcome: &Result<Response, RouterError>,
) {
    let (response, error) = match outcome {
        Ok(response) => (Some(recorded_response(response)), None),
        Err(err) => (None, Some(ErrorDetails::from_error(err))),
    };
    ctx.orchestrations.push(Orchestration {
        name: route_name.to_string(),
        request,
        response,
        error,
    });
}

/// Build the audit record for a settled non-primary route.
#[must_use]
pub fn secondary_record(
    route_name: &str,
    request: OrchestrationRequest,
    outcome: &Result<Response, RouterError>,
) -> RouteRecord {
    let mut record = RouteRecord::named(route_name);
    record.request = Some(request);

    match outcome {
        Ok(downstream) if response::is_mediator_response(downstream) => {
            match serde_json::from_slice::<MediatorResponse>(&downstream.body) {
                Ok(mediator) => lift_mediator(&mut record, &mediator, downstream),
                Err(err) => {
                    tracing::warn!(
                        route = route_name,
                        error = %err,
                        "Secondary route returned an unparseable mediator body, recording it as-is"
                    );
                    record.response = Some(recorded_response(downstream));
                }
            }
        }
        Ok(downstream) => record.response = Some(recorded_response(downstream)),
        Err(err) => record.error = Some(ErrorDetails::from_error(err)),
    }

    record
}

fn lift_mediator(record: &mut RouteRecord, mediator: &MediatorResponse, downstream: &Response) {
    let embedded = response::mediator_inner_to_response(&mediator.response, downstream);
    record.response = Some(recorded_response(&embedded));
    record.mediator_urn = mediator.mediator_urn.clone();
    if let Some(orchestrations) = &mediator.orchestrations {
        record.orchestrations = orchestrations.clone();
    }
    record.properties = mediator.properties.clone();
    record.metrics = mediator.metrics.clone();
    if let Some(error) = &mediator.error {
        record.error = Some(error.clone());
    }
}

fn recorded_response(response: &Response) -> RecordedResponse {
    RecordedResponse {
        status: response.status,
        headers: response.headers.clone(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        timestamp: Some(response.timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hie_router_core::{Channel, Headers};

    fn outcome_ok(status: u16, headers: &[(&str, &str)], body: &str) -> Result<Response, RouterError> {
        Ok(Response {
            status,
            headers: headers.iter().copied().collect(),
            body: Bytes::from(body.to_string()),
            timestamp: Utc::now(),
        })
    }

    fn request() -> OrchestrationRequest {
        OrchestrationRequest {
            host: Some("h".to_string()),
            port: Some("80".to_string()),
            path: "/x".to_string(),
            headers: Headers::new(),
            method: "GET".to_string(),
            body: None,
            timestamp: Some(Utc::now()),
        }
    }

    #[test]
    fn success_fills_request_and_response() {
        let record = secondary_record("audit", request(), &outcome_ok(200, &[], "ok"));

        assert_eq!(record.name, "audit");
        assert!(record.request.is_some());
        let response = record.response.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "ok");
        assert!(record.error.is_none());
    }

    #[test]
    fn failure_attaches_error_details() {
        let record = secondary_record(
            "audit",
            request(),
            &Err(RouterError::Timeout(1500)),
        );

        assert!(record.response.is_none());
        assert_eq!(
            record.error.unwrap().message,
            "Request took longer than 1500ms"
        );
    }

    #[test]
    fn mediator_fields_are_lifted_into_the_record() {
        let body = r#"{
            "x-mediator-urn": "urn:mediator:lab",
            "response": {"status": "201", "body": "stored", "headers": {}},
            "orchestrations": [{"name": "validate", "request": {"path": "/v", "method": "POST"}}],
            "properties": {"lab": "7"},
            "metrics": {"duration": 12}
        }"#;
        let record = secondary_record(
            "lab-feed",
            request(),
            &outcome_ok(200, &[("content-type", "application/json+openhim")], body),
        );

        assert_eq!(record.mediator_urn.as_deref(), Some("urn:mediator:lab"));
        assert_eq!(record.orchestrations.len(), 1);
        assert_eq!(record.properties.unwrap()["lab"], "7");
        let response = record.response.unwrap();
        assert_eq!(response.status, 201, "numeric-string status is parsed");
        assert_eq!(response.body, "stored");
    }

    #[test]
    fn primary_attempts_are_traced_on_the_context() {
        let mut ctx = RequestContext::new(Channel::new("c"), "GET", "/x");
        record_primary_attempt(&mut ctx, "upstream", request(), &outcome_ok(200, &[], "ok"));
        record_primary_attempt(
            &mut ctx,
            "upstream",
            request(),
            &Err(RouterError::transport("connection refused")),
        );

        assert_eq!(ctx.orchestrations.len(), 2);
        assert!(ctx.orchestrations[0].response.is_some());
        assert_eq!(
            ctx.orchestrations[1].error.as_ref().unwrap().message,
            "connection refused"
        );
    }

    #[test]
    fn bus_requests_record_the_inbound_form() {
        let channel = Channel::new("labs").with_url_pattern("^/fhir/.*$");
        let ctx = RequestContext::new(channel, "POST", "/fhir/Patient").with_body("data");
        let inbound = InboundRequest::from_context(&ctx);
        let outbound = OutboundRequest::Bus(crate::options::BusOptions {
            brokers: vec!["localhost:9092".to_string()],
            topic: "audit".to_string(),
            client_id: "c".to_string(),
            timeout: std::time::Duration::from_secs(1),
        });

        let summary = request_summary(&inbound, &outbound, Utc::now());
        assert_eq!(summary.host, None);
        assert_eq!(summary.path, "/fhir/Patient");
        assert_eq!(summary.method, "POST");
        assert_eq!(summary.body.as_deref(), Some("data"));
    }
}
