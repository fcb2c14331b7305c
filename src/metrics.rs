use crate::types::error::ProxyError;
use metrics::{Unit, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Histogram of proxied request durations, labeled by
/// path/method/status_code/installation_id/size.
pub const REQUESTS_DURATION: &str = "s3relay_requests_duration";

/// Install the process-global Prometheus recorder and return the handle
/// used to render the `/metrics` exposition.
pub fn install_recorder() -> Result<PrometheusHandle, ProxyError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ProxyError::Config(format!("could not install metrics recorder: {e}")))?;
    describe_histogram!(
        REQUESTS_DURATION,
        Unit::Seconds,
        "Duration of proxied requests."
    );
    Ok(handle)
}

/// Per-request metric accumulator.
///
/// Created at request entry and flushed exactly once from `Drop`, which
/// covers every exit path: the success path (dropped when the relayed body
/// finishes streaming), handled errors, and unwinding after a panic. The
/// status code stays `-1` if the request never produced one.
pub struct RequestObservation {
    path: String,
    method: String,
    installation_id: String,
    status_code: i32,
    bytes: u64,
    start: Instant,
}

impl RequestObservation {
    pub fn new(path: &str, method: &str, installation_id: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            installation_id: installation_id.to_string(),
            status_code: -1,
            bytes: 0,
            start: Instant::now(),
        }
    }

    pub fn set_status(&mut self, status: u16) {
        self.status_code = i32::from(status);
    }

    pub fn add_bytes(&mut self, n: u64) {
        self.bytes += n;
    }
}

impl Drop for RequestObservation {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        histogram!(
            REQUESTS_DURATION,
            "path" => self.path.clone(),
            "method" => self.method.clone(),
            "status_code" => self.status_code.to_string(),
            "installation_id" => self.installation_id.clone(),
            "size" => self.bytes.to_string(),
        )
        .record(elapsed);
    }
}
