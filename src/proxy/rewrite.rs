use crate::types::{ProxyTarget, error::ProxyError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::Url;

/// S3 path-encoding rule: everything outside the RFC 3986 unreserved set is
/// percent-encoded. Stricter than the RFC requires; in particular space
/// becomes `%20` and `+` becomes `%2B`, because that is the form the
/// upstream store canonicalizes before verifying signatures.
const S3_PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Remove exactly one leading `/<bucket>` prefix from the path. No-op when
/// the path does not start with the bucket segment.
pub fn strip_bucket<'a>(path: &'a str, bucket: &str) -> &'a str {
    match path.strip_prefix('/') {
        Some(rest) if rest.starts_with(bucket) => &path[1 + bucket.len()..],
        _ => path,
    }
}

/// Re-encode a path per the S3 rule, segment by segment.
///
/// Existing percent-escapes are decoded first so an inbound path that the
/// HTTP layer (or an earlier proxy) partially decoded lands on the same
/// canonical form as one that arrived fully encoded. Skipping this step
/// would leave `+` and space unescaped and the upstream signature check
/// would fail.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, S3_PATH_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Rebuild the inbound path/query into the fully qualified upstream URL:
/// `scheme://<bucket>.<endpoint><encoded-path>[?query]`. The query string is
/// preserved verbatim.
pub fn rewrite_url(
    target: &ProxyTarget,
    path: &str,
    query: Option<&str>,
) -> Result<Url, ProxyError> {
    let object_path = strip_bucket(path, &target.bucket);
    let mut url_str = format!(
        "{}://{}{}",
        target.scheme,
        target.host(),
        encode_path(object_path)
    );
    if let Some(query) = query
        && !query.is_empty()
    {
        url_str.push('?');
        url_str.push_str(query);
    }
    Url::parse(&url_str).map_err(|e| ProxyError::Rewrite(format!("{url_str}: {e}")))
}
