pub mod error;
mod models;

pub use models::{BuildInfo, Credentials, ProxyTarget};
