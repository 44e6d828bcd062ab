//! HTTP front end
//!
//! Every request goes through one fallback handler: method check, path
//! classification, tenant filter construction, parameter rewriting, then
//! forwarding. Any failure before the upstream call ends the request with the
//! error envelope and no upstream traffic.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::error::ProxyError;
use crate::proxy::{Forwarder, parse_form, rewrite_params};
use crate::rewrite::filter::Filter;
use crate::router::classify;

/// Largest form body read from a `POST`
pub const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Shared, read-only request handling state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let forwarder = Forwarder::new(
            config.upstream_url()?,
            config.prefix_path().to_string(),
            config.connect_timeout(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(proxy_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
async fn proxy_request(State(state): State<AppState>, request: Request) -> Response {
    match handle(&state, request).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_client_error() {
                warn!(error = %err, "rejecting request");
            } else {
                error!(error = %err, "request failed");
            }
            err.into_response()
        }
    }
}

async fn handle(state: &AppState, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    if parts.method != Method::GET && parts.method != Method::POST {
        return Err(ProxyError::UnsupportedMethod(parts.method.to_string()));
    }

    let raw_path = parts.uri.path();
    let path = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| ProxyError::Unsupported(raw_path.to_string()))?;
    let route = classify(&path)?;
    let filter = Filter::from_tenant(route.tenant, &state.config.tenant_label)?;

    let body = if parts.method == Method::POST && is_form(&parts.headers) {
        read_form_body(body).await?
    } else {
        Bytes::new()
    };

    let form = parse_form(&body, parts.uri.query());
    let params = rewrite_params(route.api_type, form, &filter, state.config.unfiltered)?;
    let url = state.forwarder.upstream_url(route.api_path, &params);

    state.forwarder.forward(url).await
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

async fn read_form_body(body: Body) -> Result<Bytes, ProxyError> {
    to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|err| ProxyError::InvalidForm(err.to_string()))
}

/// Bind the listen address and serve until Ctrl-C or SIGTERM
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.listen_socket()?;
    let state = AppState::new(config)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
