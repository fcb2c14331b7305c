use crate::app_state::AppState;
use crate::auth::sign::{SigningContext, sign_request};
use crate::metrics::RequestObservation;
use crate::types::error::{ErrorEnvelope, ProxyError};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::FutureExt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

/// Entry point for every proxied request.
///
/// The entire pipeline runs inside an unwind boundary: a panic in any stage
/// is caught and logged, and the process keeps serving. The metric
/// observation is created before the boundary-protected future and flushed
/// from its destructor, so exactly one observation is recorded per request
/// whether the pipeline succeeds, fails, or panics.
pub async fn proxy_request(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let installation_id = installation_id_from_path(&path, state.installation_id_segment);
    let observation = RequestObservation::new(&path, &method, &installation_id);

    let pipeline = AssertUnwindSafe(handle(&state, request, &installation_id, observation));
    match pipeline.catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            tracing::error!(
                method,
                url = path,
                cause = panic_message(&panic),
                backtrace = %std::backtrace::Backtrace::force_capture(),
                "recovered from panic while handling request"
            );
            // Headers may already be committed; do not attempt a fresh
            // error envelope here.
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle(
    state: &AppState,
    request: Request,
    installation_id: &str,
    mut observation: RequestObservation,
) -> Response {
    match run_pipeline(state, request, installation_id).await {
        Ok(upstream) => {
            observation.set_status(upstream.status().as_u16());
            super::forward::relay_response(
                upstream,
                state.response_header_allow_list.as_deref(),
                observation,
            )
        }
        Err(err) => error_response(&state.target.bucket, &err, observation),
    }
}

/// The sequential request pipeline:
/// validate (if enabled) -> rewrite -> credentials -> sign -> forward.
async fn run_pipeline(
    state: &AppState,
    request: Request,
    installation_id: &str,
) -> Result<reqwest::Response, ProxyError> {
    if let Some(validator) = &state.validator {
        let remote = remote_addr(&request).ok_or_else(|| {
            ProxyError::Validation("remote address unavailable for validation".to_string())
        })?;
        validator
            .validate(remote.ip(), installation_id)
            .await
            .map_err(|e| {
                ProxyError::Validation(format!(
                    "installation ID request validation failed: {e}"
                ))
            })?;
    }

    let (parts, body) = request.into_parts();
    let target_url =
        super::rewrite::rewrite_url(&state.target, parts.uri.path(), parts.uri.query())?;
    tracing::debug!(
        method = %parts.method,
        url = %parts.uri,
        target_url = %target_url,
        "received request"
    );

    let credentials = state.credentials.get().await?;

    let mut headers = parts.headers;
    let ctx = SigningContext {
        timestamp: Utc::now(),
        region: &state.target.region,
        credentials: &credentials,
    };
    sign_request(&parts.method, &target_url, &mut headers, &ctx)?;

    super::forward::forward(&state.client, parts.method, target_url, headers, body).await
}

/// Uniform error responder: any pipeline failure becomes the fixed S3-style
/// XML envelope with status 500. Only the logged detail differs by kind.
fn error_response(
    bucket: &str,
    err: &ProxyError,
    mut observation: RequestObservation,
) -> Response {
    tracing::error!(error = %err, "request failed");

    let envelope = ErrorEnvelope::new(
        StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        err.to_string(),
        bucket,
    );
    let body = envelope.to_xml();
    observation.set_status(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
    observation.add_bytes(body.len() as u64);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}

/// The installation id is carried by a fixed path segment (1-based,
/// configurable; segment 1 by default). Empty when the path is too short.
fn installation_id_from_path(path: &str, segment: usize) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .nth(segment.saturating_sub(1))
        .unwrap_or_default()
        .to_string()
}

fn remote_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0)
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
