// Library exports for integration tests
pub mod app_state;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use app_state::{AppState, OpsState};
pub use auth::{CredentialSource, StaticCredentialSource, source_from_settings};
pub use config::{Config, S3Settings, ServiceSettings};
pub use types::{BuildInfo, Credentials, ProxyTarget};

// Re-export router creation functions
pub use server::{create_app, create_ops_app};
