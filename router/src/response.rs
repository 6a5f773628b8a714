//! Response adapter: translate the primary route's downstream response into
//! the client-visible response on the request context.
//!
//! Reserved headers are dispatched case-insensitively (`set-cookie`,
//! `location`, `content-type`, and the hop-by-hop set the outer framework
//! re-derives); everything else is copied verbatim with its original casing.
//! Responses framed by a mediator (`application/json+openhim`) are unwrapped
//! first: the embedded response is what the client sees, and the frame's
//! error, URN, orchestrations, properties and metrics land on the context.

use bytes::Bytes;
use chrono::Utc;
use hie_router_core::{
    CookieOptions, Headers, MediatorInner, MediatorResponse, RequestContext, Response, RouterError,
    SetCookie,
};
use serde_json::Value;

/// Transaction-id header round-tripped from the inbound request onto the
/// response.
pub const TRANSACTION_ID_HEADER: &str = "X-OpenHIM-TransactionID";

/// Content-type discriminator for mediator-framed responses. Matched as a
/// substring.
pub const MEDIATOR_CONTENT_TYPE: &str = "application/json+openhim";

/// Whether a downstream response is mediator-framed.
#[must_use]
pub fn is_mediator_response(response: &Response) -> bool {
    response
        .headers
        .get("content-type")
        .is_some_and(|content_type| content_type.contains(MEDIATOR_CONTENT_TYPE))
}

/// Apply the primary route's response to the context.
///
/// # Errors
///
/// Returns a transport error when a mediator-framed body is not valid
/// mediator JSON; the dispatcher then follows the primary-failure path.
pub fn apply_primary_response(
    ctx: &mut RequestContext,
    response: &Response,
) -> Result<(), RouterError> {
    if is_mediator_response(response) {
        let mediator: MediatorResponse = serde_json::from_slice(&response.body).map_err(|err| {
            RouterError::transport(format!("invalid mediator response body: {err}"))
        })?;

        if let Some(error) = &mediator.error {
            tracing::warn!(
                transaction = %ctx.transaction_id,
                error = %error.message,
                "Mediator reported an error, marking transaction for retry"
            );
            ctx.error = Some(error.clone());
            ctx.auto_retry = true;
        }

        let embedded = mediator_inner_to_response(&mediator.response, response);
        if let Some(orchestrations) = &mediator.orchestrations {
            ctx.orchestrations.extend(orchestrations.iter().cloned());
        }
        ctx.mediator_response = Some(mediator);
        set_context_response(ctx, &embedded);
    } else {
        set_context_response(ctx, response);
    }
    Ok(())
}

/// Materialize the response embedded in a mediator frame. A status that is
/// neither a number nor a numeric string is logged and left unchanged, i.e.
/// the transport-level status stays in effect.
pub(crate) fn mediator_inner_to_response(inner: &MediatorInner, outer: &Response) -> Response {
    let status = parse_status(&inner.status).unwrap_or_else(|| {
        tracing::warn!(
            status = %inner.status,
            "Mediator response status is not numeric, keeping the transport status"
        );
        outer.status
    });

    Response {
        status,
        headers: inner.headers.clone(),
        body: inner.body.clone().map(Bytes::from).unwrap_or_default(),
        timestamp: inner.timestamp.unwrap_or(outer.timestamp),
    }
}

fn parse_status(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn set_context_response(ctx: &mut RequestContext, response: &Response) {
    let mut headers = response.headers.clone();
    if let Some(id) = ctx.headers.get(TRANSACTION_ID_HEADER) {
        let id = id.to_string();
        headers.insert(TRANSACTION_ID_HEADER, id);
    }

    ctx.response.status = response.status;
    ctx.response.body = response.body.clone();
    ctx.response.timestamp = Some(response.timestamp);

    for (name, value) in headers.iter() {
        match name.to_ascii_lowercase().as_str() {
            "set-cookie" => {
                for raw in value.all() {
                    ctx.response.cookies.extend(parse_set_cookie(raw));
                }
            }
            "location" => {
                if (300..400).contains(&response.status) {
                    ctx.response.redirect = Some(value.first().to_string());
                } else {
                    ctx.response.headers.insert_value(name, value.clone());
                }
            }
            "content-type" => {
                ctx.response.content_type = Some(value.first().to_string());
            }
            // Re-derived by the outer framework once the body is final.
            "content-length" | "content-encoding" | "transfer-encoding" => {}
            _ => {
                ctx.response.headers.insert_value(name, value.clone());
            }
        }
    }
}

/// Parse one `set-cookie` header value.
///
/// Reserved option names configure the cookie; every remaining name/value
/// pair becomes a cookie carrying those options. Unknown names are never
/// option overrides.
pub(crate) fn parse_set_cookie(raw: &str) -> Vec<SetCookie> {
    let mut options = CookieOptions::default();
    let mut pairs: Vec<(String, String)> = Vec::new();

    for part in raw.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (part, ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "max-age" => options.max_age = value.parse().ok(),
            "expires" => {
                options.expires = chrono::DateTime::parse_from_rfc2822(value)
                    .ok()
                    .map(|date| date.with_timezone(&Utc));
            }
            "path" => options.path = Some(value.to_string()),
            "domain" => options.domain = Some(value.to_string()),
            "secure" => options.secure = true,
            "signed" => options.signed = true,
            "overwrite" => options.overwrite = value == "true",
            "httponly" => options.http_only = true,
            _ => pairs.push((key.to_string(), value.to_string())),
        }
    }

    pairs
        .into_iter()
        .map(|(name, value)| SetCookie {
            name,
            value,
            options: options.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hie_router_core::{Channel, HeaderValue};

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> Response {
        Response {
            status,
            headers: headers.iter().copied().collect(),
            body: Bytes::from(body.to_string()),
            timestamp: Utc::now(),
        }
    }

    fn context() -> RequestContext {
        RequestContext::new(Channel::new("labs"), "GET", "/fhir/Patient")
    }

    #[test]
    fn status_body_and_content_type_are_copied() {
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(201, &[("content-type", "text/plain"), ("x-upstream", "a")], "created"),
        )
        .unwrap();

        assert_eq!(ctx.response.status, 201);
        assert_eq!(ctx.response.body, Bytes::from_static(b"created"));
        assert_eq!(ctx.response.content_type.as_deref(), Some("text/plain"));
        assert_eq!(ctx.response.headers.get("x-upstream"), Some("a"));
        assert!(ctx.response.timestamp.is_some());
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(
                200,
                &[
                    ("content-length", "5"),
                    ("Content-Encoding", "gzip"),
                    ("transfer-encoding", "chunked"),
                ],
                "hello",
            ),
        )
        .unwrap();

        assert!(ctx.response.headers.is_empty());
    }

    #[test]
    fn transaction_id_header_round_trips() {
        let mut ctx = context();
        ctx.headers.insert(TRANSACTION_ID_HEADER, "abc123");

        apply_primary_response(&mut ctx, &response(200, &[], "ok")).unwrap();

        assert_eq!(ctx.response.headers.get(TRANSACTION_ID_HEADER), Some("abc123"));
    }

    #[test]
    fn redirect_is_issued_for_3xx_location() {
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(302, &[("location", "/elsewhere")], ""),
        )
        .unwrap();

        assert_eq!(ctx.response.redirect.as_deref(), Some("/elsewhere"));
        assert!(!ctx.response.headers.contains("location"));
    }

    #[test]
    fn location_is_copied_literally_outside_3xx() {
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(201, &[("Location", "/created/1")], ""),
        )
        .unwrap();

        assert!(ctx.response.redirect.is_none());
        assert_eq!(ctx.response.headers.get("location"), Some("/created/1"));
    }

    #[test]
    fn cookies_are_parsed_with_reserved_options() {
        let mut ctx = context();
        let mut headers = Headers::new();
        headers.insert_value(
            "set-cookie",
            HeaderValue::Multi(vec![
                "session=tok; Max-Age=3600; Path=/; Secure; HttpOnly; overwrite=true".to_string(),
                "plain=1".to_string(),
            ]),
        );
        let downstream = Response {
            status: 200,
            headers,
            body: Bytes::new(),
            timestamp: Utc::now(),
        };

        apply_primary_response(&mut ctx, &downstream).unwrap();

        assert_eq!(ctx.response.cookies.len(), 2);
        let session = &ctx.response.cookies[0];
        assert_eq!(session.name, "session");
        assert_eq!(session.value, "tok");
        assert_eq!(session.options.max_age, Some(3600));
        assert_eq!(session.options.path.as_deref(), Some("/"));
        assert!(session.options.secure);
        assert!(session.options.http_only);
        assert!(session.options.overwrite);

        let plain = &ctx.response.cookies[1];
        assert_eq!(plain.name, "plain");
        assert_eq!(plain.options, CookieOptions::default());
    }

    #[test]
    fn cookie_expires_parses_http_dates() {
        let cookies = parse_set_cookie("k=v; Expires=Wed, 21 Oct 2015 07:28:00 GMT");
        let expected = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(cookies[0].options.expires, Some(expected));
    }

    #[test]
    fn unknown_cookie_attributes_become_cookies_not_options() {
        let cookies = parse_set_cookie("a=1; shadow=x; Path=/p");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[1].name, "shadow");
        assert_eq!(cookies[1].value, "x");
        assert_eq!(cookies[0].options.path.as_deref(), Some("/p"));
    }

    #[test]
    fn mediator_frame_is_unwrapped() {
        let body = r#"{
            "x-mediator-urn": "urn:mediator:test",
            "response": {"status": 502, "body": "bad", "headers": {}},
            "error": {"message": "upstream down"}
        }"#;
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(200, &[("content-type", "application/json+openhim")], body),
        )
        .unwrap();

        assert_eq!(ctx.response.status, 502);
        assert_eq!(ctx.response.body, Bytes::from_static(b"bad"));
        assert_eq!(ctx.error.as_ref().unwrap().message, "upstream down");
        assert!(ctx.auto_retry);
        let mediator = ctx.mediator_response.as_ref().unwrap();
        assert_eq!(mediator.mediator_urn.as_deref(), Some("urn:mediator:test"));
    }

    #[test]
    fn mediator_discriminator_matches_as_substring() {
        let body = r#"{"response": {"status": 200, "body": "ok", "headers": {}}}"#;
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(
                200,
                &[("content-type", "application/json+openhim; charset=utf-8")],
                body,
            ),
        )
        .unwrap();

        assert!(ctx.mediator_response.is_some());
        assert!(!ctx.auto_retry);
    }

    #[test]
    fn mediator_orchestrations_are_appended_to_the_trace() {
        let body = r#"{
            "response": {"status": 200, "body": "ok", "headers": {}},
            "orchestrations": [{
                "name": "lookup",
                "request": {"path": "/lookup", "method": "GET"}
            }]
        }"#;
        let mut ctx = context();
        apply_primary_response(
            &mut ctx,
            &response(200, &[("content-type", "application/json+openhim")], body),
        )
        .unwrap();

        assert_eq!(ctx.orchestrations.len(), 1);
        assert_eq!(ctx.orchestrations[0].name, "lookup");
    }

    #[test]
    fn numeric_string_status_is_parsed() {
        let inner = MediatorInner {
            status: Value::String("404".to_string()),
            headers: Headers::new(),
            body: None,
            timestamp: None,
        };
        let outer = response(200, &[], "");
        assert_eq!(mediator_inner_to_response(&inner, &outer).status, 404);
    }

    #[test]
    fn non_numeric_status_keeps_the_transport_status() {
        let inner = MediatorInner {
            status: Value::String("Successful".to_string()),
            headers: Headers::new(),
            body: None,
            timestamp: None,
        };
        let outer = response(200, &[], "");
        assert_eq!(mediator_inner_to_response(&inner, &outer).status, 200);
    }

    #[test]
    fn malformed_mediator_body_is_an_error() {
        let mut ctx = context();
        let result = apply_primary_response(
            &mut ctx,
            &response(
                200,
                &[("content-type", "application/json+openhim")],
                "not json",
            ),
        );
        assert!(result.is_err());
    }
}
