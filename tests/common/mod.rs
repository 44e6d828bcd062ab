// Test helpers shared by the integration tests
#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use rusty_promql_proxy::{Config, Filter, UnfilteredPolicy, add_query_filter, server};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Rewrite `query` for bare tenant `t1` under the reject policy
pub fn rewrite(query: &str) -> Result<String, rusty_promql_proxy::RewriteError> {
    let filter = Filter::from_tenant("t1", "tenant").unwrap();
    add_query_filter(&filter, query, UnfilteredPolicy::Reject)
}

/// Assert that a query rewrites to the expected text
#[macro_export]
macro_rules! assert_rewrites {
    ($input:expr, $expected:expr) => {{
        let result = $crate::common::rewrite($input);
        assert!(
            result.is_ok(),
            "Expected '{}' to rewrite, got error: {:?}",
            $input,
            result.as_ref().err()
        );
        let output = result.unwrap();
        assert_eq!(
            output, $expected,
            "Rewrite mismatch for input '{}'\n  got:      '{}'\n  expected: '{}'",
            $input, output, $expected
        );
    }};
}

/// Assert that a query is refused by the rewriter
#[macro_export]
macro_rules! assert_rewrite_error {
    ($input:expr) => {{
        let result = $crate::common::rewrite($input);
        assert!(
            result.is_err(),
            "Expected '{}' to be refused, but got: {:?}",
            $input,
            result.ok()
        );
    }};
}

/// A request as seen by the mock upstream
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

impl Recorded {
    /// Decoded query string pairs, in wire order
    pub fn params(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_deref().unwrap_or_default().as_bytes())
            .into_owned()
            .collect()
    }

    pub fn values(&self, key: &str) -> Vec<String> {
        self.params()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }
}

/// A throwaway upstream that records every request it receives
///
/// It answers with a JSON body, two `x-upstream` header values and its own
/// `Content-Length`. Paths ending in `/labels` answer 503.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub const UPSTREAM_BODY: &str = r#"{"status":"success","data":[]}"#;

impl MockUpstream {
    pub async fn start() -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .fallback(record)
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// The single request received so far
    pub fn only_request(&self) -> Recorded {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected one upstream request, got {:?}", requests);
        requests.into_iter().next().unwrap()
    }
}

async fn record(State(requests): State<Arc<Mutex<Vec<Recorded>>>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    requests.lock().unwrap().push(Recorded {
        method: request.method().to_string(),
        path: path.clone(),
        query: request.uri().query().map(str::to_string),
    });

    let status = if path.ends_with("/labels") {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.append("x-upstream", HeaderValue::from_static("one"));
    headers.append("x-upstream", HeaderValue::from_static("two"));

    (status, headers, UPSTREAM_BODY).into_response()
}

/// Sends once when dropped
struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// An upstream that sends the first chunk of a body and then stalls
///
/// The returned receiver resolves once the upstream server drops the body,
/// which only happens when the other end of the connection goes away.
pub async fn stalling_upstream() -> (SocketAddr, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));

    let app = Router::new().fallback(move || {
        let signal = DropSignal(tx.lock().unwrap().take());
        async move {
            let body = futures::stream::unfold((signal, false), |(signal, sent)| async move {
                if sent {
                    futures::future::pending::<()>().await;
                    None
                } else {
                    Some((Ok::<_, Infallible>(Bytes::from_static(b"[")), (signal, true)))
                }
            });
            Body::from_stream(body)
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, rx)
}

/// Proxy configuration pointed at `upstream`
pub fn config(upstream: &str, extra: &[&str]) -> Config {
    use clap::Parser;

    let mut args = vec![
        "rusty-promql-proxy",
        "--upstream.addr",
        upstream,
        "--proxy.listen-addr",
        "127.0.0.1:0",
    ];
    args.extend_from_slice(extra);
    Config::try_parse_from(args).unwrap()
}

/// The proxy router for `config`
pub fn proxy(config: Config) -> Router {
    server::router(server::AppState::new(config).unwrap())
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn get(uri: &str) -> Request {
    axum::http::Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, form: &str) -> Request {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}
