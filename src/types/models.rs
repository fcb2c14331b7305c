/// Credentials used to sign outbound requests.
///
/// This is an immutable value obtained from a `CredentialSource` per request.
/// It is never written back into configuration.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Static description of the upstream object store.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub scheme: String,
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
}

impl ProxyTarget {
    /// Host of the upstream store in virtual-hosted addressing,
    /// i.e. `<bucket>.<endpoint>`.
    pub fn host(&self) -> String {
        format!("{}.{}", self.bucket, self.endpoint)
    }
}

/// Version information reported by the health endpoint.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub commit_hash: String,
    pub build_date: String,
}

impl BuildInfo {
    /// Read the values injected by build.rs at compile time.
    pub fn from_build_env() -> Self {
        Self {
            commit_hash: env!("S3RELAY_COMMIT_HASH").to_string(),
            build_date: env!("S3RELAY_BUILD_DATE").to_string(),
        }
    }
}
