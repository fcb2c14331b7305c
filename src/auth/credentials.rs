use crate::config::S3Settings;
use crate::types::{Credentials, error::ProxyError};
use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use std::sync::Arc;

/// Supplies the credentials used to sign outbound requests.
///
/// Called from every request handler concurrently. Implementations must
/// either return a complete credential set or an error, never a
/// partially-filled value.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn get(&self) -> Result<Credentials, ProxyError>;
}

/// Fixed credentials taken from configuration at startup.
pub struct StaticCredentialSource {
    credentials: Credentials,
}

impl StaticCredentialSource {
    pub fn new(access_key_id: String, secret_access_key: String) -> Self {
        Self {
            credentials: Credentials {
                access_key_id,
                secret_access_key,
                session_token: None,
            },
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn get(&self) -> Result<Credentials, ProxyError> {
        Ok(self.credentials.clone())
    }
}

/// Credentials resolved from the deployment environment (IAM role,
/// environment variables, instance metadata) at call time.
///
/// Used when neither an access key nor a secret is configured. Values are
/// read fresh per request so expiring session tokens stay current; the AWS
/// provider chain handles caching and refresh internally.
pub struct AmbientCredentialSource {
    provider: SharedCredentialsProvider,
}

impl AmbientCredentialSource {
    pub async fn new() -> Result<Self, ProxyError> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            ProxyError::Credential("no ambient credentials provider available".to_string())
        })?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl CredentialSource for AmbientCredentialSource {
    async fn get(&self) -> Result<Credentials, ProxyError> {
        let resolved = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| ProxyError::Credential(e.to_string()))?;
        Ok(Credentials {
            access_key_id: resolved.access_key_id().to_string(),
            secret_access_key: resolved.secret_access_key().to_string(),
            session_token: resolved.session_token().map(str::to_string),
        })
    }
}

/// Pick the credential source variant from the S3 settings: static when a
/// key pair is configured, ambient when both fields are empty.
pub async fn source_from_settings(
    settings: &S3Settings,
) -> Result<Arc<dyn CredentialSource>, ProxyError> {
    if settings.access_key_id.is_empty() && settings.secret_access_key.is_empty() {
        tracing::info!("no static credentials configured, using ambient identity");
        Ok(Arc::new(AmbientCredentialSource::new().await?))
    } else {
        Ok(Arc::new(StaticCredentialSource::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_returns_fixed_value() {
        let source =
            StaticCredentialSource::new("AKIA2AccessKey".to_string(), "secret".to_string());
        let first = source.get().await.unwrap();
        let second = source.get().await.unwrap();
        assert_eq!(first.access_key_id, "AKIA2AccessKey");
        assert_eq!(first.secret_access_key, "secret");
        assert!(first.session_token.is_none());
        assert_eq!(second.access_key_id, first.access_key_id);
    }

    #[tokio::test]
    async fn test_source_from_settings_prefers_static() {
        let settings = S3Settings {
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            ..Default::default()
        };
        let source = source_from_settings(&settings).await.unwrap();
        let creds = source.get().await.unwrap();
        assert_eq!(creds.access_key_id, "key");
    }
}
