use crate::types::error::ProxyError;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use std::env;

/// Prefix for environment variable overrides, e.g.
/// `S3RELAY_S3_SETTINGS_ACCESS_KEY_ID` overrides `s3_settings.access_key_id`.
const ENV_PREFIX: &str = "S3RELAY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service_settings: ServiceSettings,
    pub s3_settings: S3Settings,
}

/// Settings for the web server and the request pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Listen address of the proxy listener.
    pub host: String,
    /// Listen address of the health/metrics listener.
    pub metrics_host: String,
    pub tls_cert_file: String,
    pub tls_key_file: String,
    /// Upper bound on idle pooled connections kept open to the upstream
    /// host. Not a hard concurrency cap; active connections beyond this
    /// are closed after use instead of being returned to the pool.
    pub max_conns_per_host: usize,
    pub response_header_timeout_secs: u64,
    /// Reverse-DNS validation of the caller against the installation id.
    pub request_validation: bool,
    pub request_validation_expected_name_suffix: String,
    /// Which path segment carries the installation id (1 or 2).
    pub installation_id_path_segment: usize,
    /// When set, only these response headers are copied back to the caller.
    /// Absent means copy everything verbatim.
    pub response_header_allow_list: Option<Vec<String>>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0:8087".to_string(),
            metrics_host: "0.0.0.0:9090".to_string(),
            tls_cert_file: String::new(),
            tls_key_file: String::new(),
            max_conns_per_host: 100,
            response_header_timeout_secs: 30,
            request_validation: false,
            request_validation_expected_name_suffix: String::new(),
            installation_id_path_segment: 1,
            response_header_allow_list: None,
        }
    }
}

/// Settings describing the upstream S3-compatible store.
///
/// Leaving both `access_key_id` and `secret_access_key` empty selects
/// ambient-identity mode: credentials are resolved from the deployment
/// environment on every request instead of from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub scheme: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: String::new(),
            region: String::new(),
            endpoint: String::new(),
            scheme: "https".to_string(),
        }
    }
}

impl Config {
    /// Read the config file, apply environment overrides and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProxyError> {
        let content = fs::read_to_string(&path).map_err(|e| {
            ProxyError::Config(format!(
                "could not open file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| ProxyError::Config(format!("could not decode file: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file-loaded values.
    fn apply_env_overrides(&mut self) {
        let svc = &mut self.service_settings;
        override_string(&mut svc.host, "SERVICE_SETTINGS_HOST");
        override_string(&mut svc.metrics_host, "SERVICE_SETTINGS_METRICS_HOST");
        override_string(&mut svc.tls_cert_file, "SERVICE_SETTINGS_TLS_CERT_FILE");
        override_string(&mut svc.tls_key_file, "SERVICE_SETTINGS_TLS_KEY_FILE");
        override_parsed(
            &mut svc.max_conns_per_host,
            "SERVICE_SETTINGS_MAX_CONNS_PER_HOST",
        );
        override_parsed(
            &mut svc.response_header_timeout_secs,
            "SERVICE_SETTINGS_RESPONSE_HEADER_TIMEOUT_SECS",
        );
        override_parsed(
            &mut svc.request_validation,
            "SERVICE_SETTINGS_REQUEST_VALIDATION",
        );
        override_string(
            &mut svc.request_validation_expected_name_suffix,
            "SERVICE_SETTINGS_REQUEST_VALIDATION_EXPECTED_NAME_SUFFIX",
        );
        override_parsed(
            &mut svc.installation_id_path_segment,
            "SERVICE_SETTINGS_INSTALLATION_ID_PATH_SEGMENT",
        );
        override_list(
            &mut svc.response_header_allow_list,
            "SERVICE_SETTINGS_RESPONSE_HEADER_ALLOW_LIST",
        );

        let s3 = &mut self.s3_settings;
        override_string(&mut s3.access_key_id, "S3_SETTINGS_ACCESS_KEY_ID");
        override_string(&mut s3.secret_access_key, "S3_SETTINGS_SECRET_ACCESS_KEY");
        override_string(&mut s3.bucket, "S3_SETTINGS_BUCKET");
        override_string(&mut s3.region, "S3_SETTINGS_REGION");
        override_string(&mut s3.endpoint, "S3_SETTINGS_ENDPOINT");
        override_string(&mut s3.scheme, "S3_SETTINGS_SCHEME");
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        let svc = &self.service_settings;
        svc.host
            .parse::<SocketAddr>()
            .map_err(|e| ProxyError::Config(format!("invalid service host {:?}: {e}", svc.host)))?;
        svc.metrics_host.parse::<SocketAddr>().map_err(|e| {
            ProxyError::Config(format!("invalid metrics host {:?}: {e}", svc.metrics_host))
        })?;
        if svc.tls_cert_file.is_empty() != svc.tls_key_file.is_empty() {
            return Err(ProxyError::Config(
                "tls_cert_file and tls_key_file must be set together".to_string(),
            ));
        }
        if svc.request_validation && svc.request_validation_expected_name_suffix.is_empty() {
            return Err(ProxyError::Config(
                "request_validation_expected_name_suffix is required when request_validation is enabled"
                    .to_string(),
            ));
        }
        if !matches!(svc.installation_id_path_segment, 1 | 2) {
            return Err(ProxyError::Config(
                "installation_id_path_segment must be 1 or 2".to_string(),
            ));
        }

        let s3 = &self.s3_settings;
        if s3.bucket.is_empty() {
            return Err(ProxyError::Config("s3 bucket is required".to_string()));
        }
        if s3.region.is_empty() {
            return Err(ProxyError::Config("s3 region is required".to_string()));
        }
        if s3.endpoint.is_empty() {
            return Err(ProxyError::Config("s3 endpoint is required".to_string()));
        }
        if s3.scheme != "http" && s3.scheme != "https" {
            return Err(ProxyError::Config(format!(
                "invalid s3 scheme {:?}: must be http or https",
                s3.scheme
            )));
        }
        // A key without a secret (or vice versa) is neither static nor
        // ambient mode and would sign requests with a half-empty credential.
        if s3.access_key_id.is_empty() != s3.secret_access_key.is_empty() {
            return Err(ProxyError::Config(
                "access_key_id and secret_access_key must be set together or both left empty"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn override_string(field: &mut String, name: &str) {
    if let Ok(value) = env::var(format!("{ENV_PREFIX}_{name}")) {
        *field = value;
    }
}

fn override_parsed<T: std::str::FromStr>(field: &mut T, name: &str) {
    if let Ok(value) = env::var(format!("{ENV_PREFIX}_{name}"))
        && let Ok(parsed) = value.parse::<T>()
    {
        *field = parsed;
    }
}

/// Comma-separated list override. An empty value clears the list back to
/// the verbatim-relay default.
fn override_list(field: &mut Option<Vec<String>>, name: &str) {
    if let Ok(value) = env::var(format!("{ENV_PREFIX}_{name}")) {
        let entries: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        *field = (!entries.is_empty()).then_some(entries);
    }
}
