use crate::auth::CredentialSource;
use crate::proxy::IdentityValidator;
use crate::types::{BuildInfo, ProxyTarget};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared state for the proxy router.
#[derive(Clone)]
pub struct AppState {
    /// Pooled client for upstream calls, shared across all requests.
    pub client: reqwest::Client,
    pub credentials: Arc<dyn CredentialSource>,
    pub target: ProxyTarget,
    /// Present only when request validation is enabled.
    pub validator: Option<Arc<IdentityValidator>>,
    /// 1-based path segment carrying the installation id.
    pub installation_id_segment: usize,
    /// When set, only these response headers are relayed to the caller.
    pub response_header_allow_list: Option<Vec<String>>,
}

/// Shared state for the health/metrics router.
#[derive(Clone)]
pub struct OpsState {
    pub build: BuildInfo,
    pub prometheus: PrometheusHandle,
}
