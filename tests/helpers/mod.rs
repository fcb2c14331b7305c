// Shared between integration test binaries; not every binary uses every item.
#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use s3relay::proxy::IdentityValidator;
use s3relay::{AppState, ProxyTarget, StaticCredentialSource, create_app};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub const TEST_ACCESS_KEY_ID: &str = "AKIA2AccessKey";
pub const TEST_SECRET_ACCESS_KEY: &str = "start/secretkey/end";
pub const TEST_BUCKET: &str = "agnivatest";
pub const TEST_REGION: &str = "us-east-1";

/// Domain the test client resolves to the stub upstream, standing in for
/// the real object-store endpoint.
pub const TEST_ENDPOINT_DOMAIN: &str = "s3.test.local";

/// A request as seen by the stub upstream.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Raw URI exactly as received, percent-encoding intact.
    pub uri: String,
    pub headers: HeaderMap,
}

/// Canned reply the stub upstream sends for every request.
pub struct CannedResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: &'static str,
}

impl CannedResponse {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![],
            body,
        }
    }
}

/// Stub upstream object store: records every request it receives and
/// answers with a canned response. Shuts down on drop.
pub struct Upstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    #[allow(dead_code)] // Keep handle alive to prevent task abort
    handle: JoinHandle<()>,
}

impl Upstream {
    pub async fn start(response: CannedResponse) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = requests.clone();
        let response = Arc::new(response);

        let app = Router::new().fallback(move |request: Request| {
            let captured = captured.clone();
            let response = response.clone();
            async move {
                captured.lock().unwrap().push(CapturedRequest {
                    method: request.method().to_string(),
                    uri: request.uri().to_string(),
                    headers: request.headers().clone(),
                });
                let mut builder = Response::builder().status(response.status);
                for (name, value) in &response.headers {
                    builder = builder.header(*name, *value);
                }
                builder.body(Body::from(response.body)).unwrap()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for Upstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Build the proxy router pointed at the stub upstream.
///
/// The endpoint carries the stub's port and the client gets a DNS override
/// for `<bucket>.<domain>`, so virtual-hosted addressing works against
/// 127.0.0.1 exactly as it would against a real store.
pub fn proxy_app(upstream_addr: SocketAddr, validator: Option<Arc<IdentityValidator>>) -> Router {
    create_app(proxy_state(
        upstream_client(upstream_addr),
        format!("{TEST_ENDPOINT_DOMAIN}:{}", upstream_addr.port()),
        validator,
        None,
    ))
}

/// Proxy router that relays only the listed response headers.
pub fn proxy_app_with_allow_list(upstream_addr: SocketAddr, allow_list: &[&str]) -> Router {
    create_app(proxy_state(
        upstream_client(upstream_addr),
        format!("{TEST_ENDPOINT_DOMAIN}:{}", upstream_addr.port()),
        None,
        Some(allow_list.iter().map(|h| h.to_string()).collect()),
    ))
}

/// Proxy router pointed at an endpoint nothing listens on, for error paths.
pub fn unreachable_proxy_app() -> Router {
    let client = reqwest::Client::builder().build().unwrap();
    // Reserved TLD, guaranteed not to resolve.
    create_app(proxy_state(
        client,
        "unreachable.invalid:1".to_string(),
        None,
        None,
    ))
}

fn upstream_client(upstream_addr: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .resolve(
            &format!("{TEST_BUCKET}.{TEST_ENDPOINT_DOMAIN}"),
            SocketAddr::from(([127, 0, 0, 1], upstream_addr.port())),
        )
        .build()
        .unwrap()
}

fn proxy_state(
    client: reqwest::Client,
    endpoint: String,
    validator: Option<Arc<IdentityValidator>>,
    response_header_allow_list: Option<Vec<String>>,
) -> AppState {
    AppState {
        client,
        credentials: Arc::new(StaticCredentialSource::new(
            TEST_ACCESS_KEY_ID.to_string(),
            TEST_SECRET_ACCESS_KEY.to_string(),
        )),
        target: ProxyTarget {
            scheme: "http".to_string(),
            endpoint,
            bucket: TEST_BUCKET.to_string(),
            region: TEST_REGION.to_string(),
        },
        validator,
        installation_id_segment: 1,
        response_header_allow_list,
    }
}
