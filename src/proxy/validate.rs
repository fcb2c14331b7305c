use crate::types::error::ProxyError;
use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::sync::Arc;

/// Reverse DNS lookup, abstracted so tests can substitute a fake resolver.
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    async fn lookup_addr(&self, addr: IpAddr) -> Result<Vec<String>, ProxyError>;
}

/// Reverse lookups through the system-configured DNS resolver.
pub struct DnsReverseLookup {
    resolver: TokioResolver,
}

impl DnsReverseLookup {
    pub fn from_system_conf() -> Result<Self, ProxyError> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| ProxyError::Config(format!("could not build DNS resolver: {e}")))?
            .build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl ReverseLookup for DnsReverseLookup {
    async fn lookup_addr(&self, addr: IpAddr) -> Result<Vec<String>, ProxyError> {
        let response = self
            .resolver
            .reverse_lookup(addr)
            .await
            .map_err(|e| ProxyError::Validation(format!("reverse lookup failed: {e}")))?;
        // PTR names come back fully qualified with a trailing dot.
        Ok(response
            .iter()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .collect())
    }
}

/// Checks that the caller's reverse DNS name matches the installation id it
/// claims in the request path.
///
/// Fails closed: a lookup error or an empty result rejects the request.
/// Guards against a caller supplying another tenant's installation id when
/// the proxy sits behind infrastructure exposing per-tenant reverse records,
/// e.g. `IP.SERVICE.NAMESPACE/INSTALLATION_ID.svc.cluster.local`.
pub struct IdentityValidator {
    expected_suffix: String,
    lookup: Arc<dyn ReverseLookup>,
}

impl IdentityValidator {
    pub fn new(expected_suffix: String, lookup: Arc<dyn ReverseLookup>) -> Self {
        Self {
            expected_suffix,
            lookup,
        }
    }

    pub async fn validate(&self, remote: IpAddr, installation_id: &str) -> Result<(), ProxyError> {
        let names = self.lookup.lookup_addr(remote).await?;
        let name = names.first().ok_or_else(|| {
            ProxyError::Validation("no names returned in reverse lookup".to_string())
        })?;

        let expected = format!(".{installation_id}.{}", self.expected_suffix);
        if !name.ends_with(&expected) {
            return Err(ProxyError::Validation(format!(
                "reverse name lookup validation failed; name={name}, installation_id={installation_id}"
            )));
        }

        tracing::debug!(name, installation_id, "reverse name lookup validation passed");
        Ok(())
    }
}
