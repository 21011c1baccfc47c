//! Exception redispatch.
//!
//! Any error raised during dispatch is normalized into an
//! [`ExceptionEnvelope`] and re-enters the dispatcher targeting the error
//! controller, so 404s, 401s and friends can have real pages. A failure
//! inside that redispatch retries once at most; repeated internal errors or
//! a missing error action degrade to a fixed static body, which is what
//! guarantees every request terminates with a response.

use minijinja::Environment;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::controller::Controller;
use crate::errors::ExceptionEnvelope;
use crate::request::{Request, ACTION_PARAM};
use crate::response::Body;

use super::core::Dispatcher;

/// How many times a failed error-controller redispatch may be retried with
/// the secondary failure before degrading to the static fallback.
const MAX_REDISPATCH_RETRIES: usize = 1;

const FALLBACK_TEMPLATE: &str = "<!DOCTYPE html>\n<html>\n  <head><title>{{ status }} {{ name }}</title></head>\n  <body>\n    <h1>{{ name }} ({{ status }})</h1>\n    <pre>{{ detail }}</pre>\n  </body>\n</html>\n";

/// Normalize a raised error and re-enter the dispatcher against the error
/// controller. Never fails: the static fallback terminates every path.
pub(crate) fn dispatch_exception(
    dispatcher: &Dispatcher,
    mut request: Request,
    raised: anyhow::Error,
) -> (Controller, String) {
    let mut envelope = ExceptionEnvelope::normalize(raised);
    error!(
        request_id = %request.request_id,
        kind = envelope.action_name(),
        status = envelope.status,
        detail = %envelope.detail,
        "dispatch failed"
    );

    // Snapshot the original request state under reserved keys before the
    // redispatch starts rewriting params.
    let params = request.params_snapshot().to_string();
    let session = request.session_snapshot().to_string();
    let cookies = request.cookies_snapshot().to_string();
    request.set_param("original_params", params);
    request.set_param("original_session", session);
    request.set_param("original_cookies", cookies);

    let mut retries = 0usize;
    loop {
        // Redirections carry no renderable content: skip the error
        // controller and emit the Location header directly.
        if envelope.is_redirection() {
            return default_exception(dispatcher, request, &envelope);
        }
        let Some(spec) = dispatcher.error_controller() else {
            return default_exception(dispatcher, request, &envelope);
        };

        request.exception = Some(Arc::new(envelope.clone()));
        request.set_param(ACTION_PARAM, envelope.action_name());

        match dispatcher.dispatch_action(spec, envelope.action_name(), request, envelope.status) {
            Ok(done) => return done,
            Err((returned, secondary)) => {
                request = returned;
                let secondary_env = ExceptionEnvelope::normalize(secondary);
                warn!(
                    request_id = %request.request_id,
                    kind = secondary_env.action_name(),
                    detail = %secondary_env.detail,
                    "error controller dispatch failed"
                );
                // No error action/template exists: fall back rendering the
                // original envelope.
                if secondary_env.is_not_found() {
                    return default_exception(dispatcher, request, &envelope);
                }
                // An internal error on either side would loop through
                // internal_server_error forever; terminate now.
                if envelope.is_internal() || secondary_env.is_internal() {
                    return default_exception(dispatcher, request, &secondary_env);
                }
                if retries >= MAX_REDISPATCH_RETRIES {
                    warn!(request_id = %request.request_id, "redispatch retry limit reached");
                    return default_exception(dispatcher, request, &secondary_env);
                }
                retries += 1;
                envelope = secondary_env;
            }
        }
    }
}

/// Produce the error response directly, bypassing dispatch entirely.
fn default_exception(
    dispatcher: &Dispatcher,
    request: Request,
    envelope: &ExceptionEnvelope,
) -> (Controller, String) {
    let spec = dispatcher
        .error_controller()
        .unwrap_or_else(|| dispatcher.fallback_spec());
    let mut controller = Controller::build(
        spec,
        Arc::clone(dispatcher.env()),
        request,
        envelope.status,
    );
    if envelope.is_redirection() {
        if let Some(location) = envelope.location() {
            controller.set_header("Location", location);
        }
        controller.set_body(Body::Empty);
    } else {
        controller.set_body(Body::Literal(render_fallback(envelope)));
    }
    (controller, envelope.action_name().to_string())
}

/// The fixed fallback body. Template failures here cannot be redispatched,
/// so any render error degrades to plain text.
fn render_fallback(envelope: &ExceptionEnvelope) -> String {
    let ctx = json!({
        "name": envelope.action_name(),
        "status": envelope.status,
        "detail": envelope.detail,
    });
    Environment::new()
        .render_str(FALLBACK_TEMPLATE, &ctx)
        .unwrap_or_else(|_| format!("Internal Server Error!\n\n{}", envelope.detail))
}
