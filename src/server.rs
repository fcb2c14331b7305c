use crate::app_state::{AppState, OpsState};
use crate::proxy::proxy_request;
use crate::types::error::ProxyError;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the proxy router.
///
/// Every method on every path goes through the signing pipeline; there is no
/// route table because the proxy assumes all inbound paths begin with a
/// bucket segment. Used by both main.rs and the integration tests so the
/// same configuration is exercised in both.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .fallback(proxy_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Create the health/metrics router served on the separate ops listener.
pub fn create_ops_app(state: OpsState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    commit_hash: String,
    build_date: String,
}

async fn health(State(state): State<OpsState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        commit_hash: state.build.commit_hash.clone(),
        build_date: state.build.build_date.clone(),
    })
}

async fn render_metrics(State(state): State<OpsState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
}

/// TLS cert/key file pair for the listener.
pub struct TlsFiles {
    pub cert_file: String,
    pub key_file: String,
}

/// Serve a router on `addr`, in plaintext or with TLS 1.2+ when cert and key
/// files are configured. The shared `Handle` coordinates graceful shutdown
/// across listeners.
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    tls: Option<TlsFiles>,
    handle: Handle,
) -> Result<(), ProxyError> {
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    let result = match tls {
        Some(files) => {
            let config = RustlsConfig::from_pem_file(&files.cert_file, &files.key_file)
                .await
                .map_err(|e| {
                    ProxyError::Config(format!(
                        "could not load TLS cert/key ({}, {}): {e}",
                        files.cert_file, files.key_file
                    ))
                })?;
            axum_server::bind_rustls(addr, config)
                .handle(handle)
                .serve(service)
                .await
        }
        None => axum_server::bind(addr).handle(handle).serve(service).await,
    };
    result.map_err(|e| ProxyError::Config(format!("server on {addr} failed: {e}")))
}
