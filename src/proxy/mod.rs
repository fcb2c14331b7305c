mod forward;
mod handler;
mod rewrite;
mod validate;

pub use forward::build_client;
pub use handler::proxy_request;
pub use rewrite::{encode_path, rewrite_url, strip_bucket};
pub use validate::{DnsReverseLookup, IdentityValidator, ReverseLookup};
