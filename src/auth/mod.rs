mod credentials;
pub mod sign;

pub use credentials::{
    AmbientCredentialSource, CredentialSource, StaticCredentialSource, source_from_settings,
};
