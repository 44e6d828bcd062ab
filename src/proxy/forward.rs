//! Upstream forwarding

use std::time::Duration;

use anyhow::Context;
use axum::{
    body::Body,
    http::{HeaderMap, header},
    response::Response,
};
use tracing::debug;
use url::Url;

use crate::error::ProxyError;
use crate::proxy::relay::RelayStream;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Sends rewritten requests to the upstream and relays the answers
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    upstream: Url,
    prefix: String,
}

impl Forwarder {
    /// `prefix` is either empty or starts with `/` and has no trailing `/`
    pub fn new(upstream: Url, prefix: String, connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            upstream,
            prefix,
        })
    }

    /// `{upstream}{prefix}{api_path}?{params}`, parameters encoded in the given order
    pub fn upstream_url(&self, api_path: &str, params: &[(String, String)]) -> Url {
        let mut url = self.upstream.clone();
        url.set_path(&format!("{}{}", self.prefix, api_path));
        url.set_query(None);
        url.set_fragment(None);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url
    }

    /// Issue a `GET` for `url` and stream the upstream response back
    ///
    /// The status and every header except `Content-Length` are copied; the
    /// body is relayed chunk by chunk.
    pub async fn forward(&self, url: Url) -> Result<Response, ProxyError> {
        debug!(url = %url, "forwarding to upstream");

        let upstream = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| ProxyError::Upstream(format!("{}: {}", url, err)))?;

        let status = upstream.status();
        let headers = copy_headers(upstream.headers());
        debug!(url = %url, status = %status, "upstream responded");

        let stream = RelayStream::new(Box::pin(upstream.bytes_stream()), url.path());
        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Copy response headers, keeping repeated names, minus `Content-Length`
pub fn copy_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if name != header::CONTENT_LENGTH {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}
