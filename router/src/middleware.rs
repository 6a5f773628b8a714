//! Outer pipeline shim: method allow-list enforcement and the adapters the
//! surrounding request pipeline mounts the engine through.

use crate::dispatch;
use bytes::Bytes;
use hie_router_core::{RequestContext, RouterEnvironment, RouterError};

/// Whether the channel's method allow-list admits the inbound request.
///
/// Permissive by default: a blank method or an empty allow-list admits
/// everything. Otherwise the upper-cased method must appear in the list.
#[must_use]
pub fn is_method_allowed(ctx: &RequestContext) -> bool {
    let method = ctx.method.trim();
    let methods = &ctx.authorised_channel.methods;
    if method.is_empty() || methods.is_empty() {
        return true;
    }
    let upper = method.to_ascii_uppercase();
    methods.iter().any(|allowed| allowed == &upper)
}

/// Route the request, invoking `next` exactly once.
///
/// A disallowed method short-circuits with a 405 response and still invokes
/// `next`; otherwise the dispatch engine runs and `next` fires at primary
/// completion (with an error only for a dispatch rejected before I/O).
pub async fn route<F>(ctx: &mut RequestContext, env: &RouterEnvironment, next: F)
where
    F: FnOnce(Option<RouterError>),
{
    if !is_method_allowed(ctx) {
        tracing::info!(
            method = %ctx.method,
            channel = %ctx.authorised_channel.name,
            "Method not allowed on channel"
        );
        let allowed = ctx.authorised_channel.methods.join(", ");
        ctx.response.status = 405;
        ctx.response.timestamp = Some(env.clock.now());
        ctx.response.body = Bytes::from(format!(
            "Request with method {} is not allowed. Only {} methods are allowed",
            ctx.method, allowed
        ));
        next(None);
        return;
    }

    dispatch::dispatch(ctx, env, next).await;
}

/// Future-shaped adapter for pipelines that chain on completion rather than
/// on a continuation.
///
/// Resolves once the dispatch has fully finalized; the dispatch outcome (the
/// value [`route`] passes to its continuation) becomes this future's result,
/// so a rejected dispatch surfaces to the pipeline's error handling.
///
/// # Errors
///
/// Returns the dispatch rejection (multiple primaries, no primary, keystore
/// failure). Transport failures do not surface here: they are already
/// reflected in the context's response.
pub async fn middleware(
    ctx: &mut RequestContext,
    env: &RouterEnvironment,
) -> Result<(), RouterError> {
    let mut rejection = None;
    route(ctx, env, |err| rejection = err).await;
    match rejection {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
