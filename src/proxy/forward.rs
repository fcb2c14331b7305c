use crate::metrics::RequestObservation;
use crate::types::error::ProxyError;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Response, StatusCode};
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use url::Url;

/// Build the pooled upstream client shared by all requests.
///
/// One attempt per inbound request; retries and backoff are intentionally
/// absent. HTTP/2 is attempted via ALPN on TLS connections.
/// `max_conns_per_host` bounds the idle connections kept in the pool per
/// host, not concurrent connections; the client opens extra connections
/// under load and closes them after use.
pub fn build_client(
    max_conns_per_host: usize,
    response_header_timeout: Duration,
) -> Result<reqwest::Client, ProxyError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(max_conns_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(30))
        .read_timeout(response_header_timeout)
        .tcp_keepalive(Duration::from_secs(30))
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .build()
        .map_err(|e| ProxyError::Config(format!("could not build upstream client: {e}")))
}

/// Execute the signed request against the upstream store, streaming the
/// inbound body through without buffering.
pub async fn forward(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
) -> Result<reqwest::Response, ProxyError> {
    client
        .request(method, url)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))
}

/// Copy the upstream response back to the caller.
///
/// Status and headers are relayed verbatim unless an allow-list is
/// configured. The body is streamed through a metering adapter that owns
/// the request observation, so byte counting and the metric flush happen
/// when the copy completes rather than when the handler returns.
pub fn relay_response(
    upstream: reqwest::Response,
    allow_list: Option<&[String]>,
    observation: RequestObservation,
) -> Response<Body> {
    let status = upstream.status();
    let mut response_headers = HeaderMap::with_capacity(upstream.headers().len());
    for (name, value) in upstream.headers() {
        let copy = match allow_list {
            Some(allowed) => allowed.iter().any(|a| a.eq_ignore_ascii_case(name.as_str())),
            None => true,
        };
        if copy {
            response_headers.append(name.clone(), value.clone());
        }
    }

    let body = Body::from_stream(MeteredStream {
        inner: upstream.bytes_stream(),
        observation,
    });

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::from_u16(status.as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    *response.headers_mut() = response_headers;
    response
}

/// Counts relayed bytes into the observation it owns; dropping the stream
/// (after the last chunk or on client disconnect) flushes the metric.
struct MeteredStream<S> {
    inner: S,
    observation: RequestObservation,
}

impl<S> Stream for MeteredStream<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            this.observation.add_bytes(chunk.len() as u64);
        }
        polled
    }
}
