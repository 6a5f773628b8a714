//! The dispatch engine: validate the route set, fan out concurrently in two
//! waves, enforce primary-first ordering, and finalize persistence.
//!
//! Wave A runs the primary together with every eager secondary; the
//! completion continuation fires exactly once, as soon as the primary's
//! response has been applied to the context, and never waits for secondary
//! siblings. Wave B (wait-for-primary secondaries) starts only after wave A
//! has fully settled, each route gated on the primary's status code. Records
//! are appended in the order attempts resolve, not the order they started.

use crate::options::{build_options, InboundRequest, OutboundRequest};
use crate::{recorder, response, transport};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use hie_router_core::{
    create_secondary_route_events, ErrorDetails, Keystore, OrchestrationRequest, RequestContext,
    Response, Route, RouterEnvironment, RouterError,
};
use std::time::Instant;

/// One settled transport attempt, posted back to the dispatcher.
struct Attempt {
    route: Route,
    request: OrchestrationRequest,
    outcome: Result<Response, RouterError>,
}

/// Evaluate a `statusCodesCheck` gate against the primary's status code.
///
/// An absent check passes. Otherwise the check is split on `,`; it passes if
/// any token equals the status, or any token containing `*` starts with the
/// status's first digit. Token order never changes the outcome.
#[must_use]
pub fn status_code_matches(check: Option<&str>, status: u16) -> bool {
    let Some(check) = check else { return true };
    let status_str = status.to_string();
    check.split(',').map(str::trim).any(|token| {
        if token.contains('*') {
            token.chars().next() == status_str.chars().next()
        } else {
            token.parse::<u16>() == Ok(status)
        }
    })
}

/// Fan an authorised request out to its channel's routes.
///
/// `done` is invoked exactly once: with an error for a rejected dispatch
/// (multiple primaries, no primary, keystore failure, all before any
/// outbound I/O), or with `None` once the primary route's response has been
/// applied to the context. Secondary routes continue to settle, persist, and
/// emit events after that; their failures are logged, never surfaced.
pub async fn dispatch<F>(ctx: &mut RequestContext, env: &RouterEnvironment, done: F)
where
    F: FnOnce(Option<RouterError>),
{
    let mut done = Some(done);
    ctx.timer = Some(Instant::now());

    let primaries = ctx
        .authorised_channel
        .enabled_routes()
        .filter(|route| route.primary)
        .count();
    if primaries != 1 {
        let channel = ctx.authorised_channel.name.clone();
        let err = if primaries > 1 {
            RouterError::MultiplePrimaries { channel }
        } else {
            RouterError::NoPrimaryRoute { channel }
        };
        tracing::error!(error = %err, "Rejecting dispatch before any route is contacted");
        finish(&mut done, Some(err));
        return;
    }

    // Channel timeout inheritance, written through onto the routes.
    if let Some(channel_timeout) = ctx.authorised_channel.timeout {
        for route in &mut ctx.authorised_channel.routes {
            if route.timeout().is_none() {
                route.set_timeout(channel_timeout);
            }
        }
    }

    let enabled: Vec<Route> = ctx.authorised_channel.enabled_routes().cloned().collect();

    let keystore = match env.keystore.get_keystore().await {
        Ok(keystore) => keystore,
        Err(err) => {
            tracing::error!(error = %err, "Could not acquire keystore, no routes attempted");
            finish(&mut done, Some(err.into()));
            return;
        }
    };

    let (wave_a, wave_b): (Vec<Route>, Vec<Route>) = enabled
        .into_iter()
        .partition(|route| route.primary || !route.wait_primary_response);

    run_wave(ctx, env, &keystore, wave_a, &mut done).await;

    let status = ctx.response.status;
    let gated: Vec<Route> = wave_b
        .into_iter()
        .filter(|route| {
            let fires = status_code_matches(route.status_codes_check.as_deref(), status);
            if !fires {
                tracing::debug!(route = %route.name, status, "Wait-for-primary route gated out");
            }
            fires
        })
        .collect();
    run_wave(ctx, env, &keystore, gated, &mut done).await;

    finalize(ctx, env).await;
}

/// Start every route in the wave concurrently and settle attempts in the
/// order they resolve. Transport futures own their inputs; only this
/// function's caller task touches the context.
async fn run_wave<F>(
    ctx: &mut RequestContext,
    env: &RouterEnvironment,
    keystore: &Keystore,
    routes: Vec<Route>,
    done: &mut Option<F>,
) where
    F: FnOnce(Option<RouterError>),
{
    if routes.is_empty() {
        return;
    }

    let inbound = InboundRequest::from_context(ctx);
    let mut attempts = FuturesUnordered::new();

    for route in routes {
        let started = env.clock.now();
        let prepared = build_options(ctx, &route, keystore, &env.config);
        let inbound = inbound.clone();
        let env = env.clone();

        attempts.push(async move {
            match prepared {
                Ok(outbound) => {
                    tracing::info!(
                        route = %route.name,
                        primary = route.primary,
                        "Dispatching route"
                    );
                    let request = recorder::request_summary(&inbound, &outbound, started);
                    let outcome = transport::send(&outbound, &inbound, &env).await;
                    Attempt {
                        route,
                        request,
                        outcome,
                    }
                }
                Err(err) => Attempt {
                    route,
                    request: unsent_request(&inbound, started),
                    outcome: Err(err),
                },
            }
        });
    }

    while let Some(attempt) = attempts.next().await {
        settle(ctx, env, attempt, done).await;
    }
}

/// The audit shape for an attempt whose outbound request never got built.
fn unsent_request(
    inbound: &InboundRequest,
    started: chrono::DateTime<chrono::Utc>,
) -> OrchestrationRequest {
    OrchestrationRequest {
        host: None,
        port: None,
        path: inbound.url.clone(),
        headers: inbound.headers.clone(),
        method: inbound.method.clone(),
        body: None,
        timestamp: Some(started),
    }
}

async fn settle<F>(
    ctx: &mut RequestContext,
    env: &RouterEnvironment,
    attempt: Attempt,
    done: &mut Option<F>,
) where
    F: FnOnce(Option<RouterError>),
{
    if attempt.route.primary {
        ctx.primary_route = Some(attempt.route.name.clone());
        recorder::record_primary_attempt(ctx, &attempt.route.name, attempt.request, &attempt.outcome);

        match attempt.outcome {
            Ok(downstream) => {
                if let Err(err) = response::apply_primary_response(ctx, &downstream) {
                    primary_failure(ctx, env, &err);
                }
            }
            Err(err) => primary_failure(ctx, env, &err),
        }
        finish(done, None);
    } else {
        let record =
            recorder::secondary_record(&attempt.route.name, attempt.request, &attempt.outcome);
        tracing::info!(
            route = %attempt.route.name,
            success = attempt.outcome.is_ok(),
            "Secondary route settled"
        );
        ctx.routes.push(record.clone());
        if let Err(err) = env.transactions.store_non_primary_response(ctx, &record).await {
            tracing::error!(
                route = %attempt.route.name,
                error = %err,
                "Failed to persist non-primary route response"
            );
        }
    }
}

/// A failed primary still completes the dispatch: the client sees a
/// synthetic 500 and the transaction is marked for automatic retry.
fn primary_failure(ctx: &mut RequestContext, env: &RouterEnvironment, err: &RouterError) {
    tracing::error!(
        transaction = %ctx.transaction_id,
        error = %err,
        "Primary route failed, returning an internal server error"
    );
    ctx.response.status = 500;
    ctx.response.body = Bytes::from_static(b"An internal server error occurred");
    ctx.response.timestamp = Some(env.clock.now());
    ctx.error = Some(ErrorDetails::from_error(err));
    ctx.auto_retry = true;
}

async fn finalize(ctx: &RequestContext, env: &RouterEnvironment) {
    if let Err(err) = env.transactions.set_final_status(ctx).await {
        tracing::error!(
            transaction = %ctx.transaction_id,
            error = %err,
            "Failed to set final transaction status"
        );
    }

    let mut events = Vec::new();
    create_secondary_route_events(
        &mut events,
        &ctx.transaction_id,
        ctx.request_timestamp,
        &ctx.authorised_channel,
        &ctx.routes,
        ctx.current_attempt,
    );
    if !events.is_empty() {
        if let Err(err) = env.events.save_events(events).await {
            tracing::error!(
                transaction = %ctx.transaction_id,
                error = %err,
                "Failed to save route events"
            );
        }
    }

    if let Some(timer) = ctx.timer {
        tracing::info!(
            transaction = %ctx.transaction_id,
            elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Dispatch complete"
        );
    }
}

fn finish<F>(done: &mut Option<F>, err: Option<RouterError>)
where
    F: FnOnce(Option<RouterError>),
{
    if let Some(done) = done.take() {
        done(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_check_passes() {
        assert!(status_code_matches(None, 404));
    }

    #[test]
    fn exact_code_matches() {
        assert!(status_code_matches(Some("404"), 404));
        assert!(!status_code_matches(Some("404"), 200));
    }

    #[test]
    fn wildcard_matches_on_first_digit() {
        assert!(status_code_matches(Some("2*"), 201));
        assert!(status_code_matches(Some("5*"), 503));
        assert!(!status_code_matches(Some("2*"), 404));
    }

    #[test]
    fn any_token_may_match() {
        assert!(status_code_matches(Some("2*,404"), 404));
        assert!(status_code_matches(Some("2*,404"), 204));
        assert!(!status_code_matches(Some("2*,404"), 500));
    }

    #[test]
    fn token_order_is_irrelevant() {
        for status in [200, 301, 404, 500] {
            assert_eq!(
                status_code_matches(Some("2*,404,500"), status),
                status_code_matches(Some("500,2*,404"), status),
            );
            assert_eq!(
                status_code_matches(Some("404,500,2*"), status),
                status_code_matches(Some("2*,404,500"), status),
            );
        }
    }

    #[test]
    fn tokens_tolerate_spaces() {
        assert!(status_code_matches(Some("500, 404"), 404));
    }

    #[test]
    fn empty_check_never_matches() {
        assert!(!status_code_matches(Some(""), 200));
    }
}
