//! Error types for the rewriting engine and the HTTP layer
//!
//! [`RewriteError`] is produced by the query rewriting engine and never
//! depends on HTTP. [`ProxyError`] wraps it and maps the whole taxonomy onto
//! status codes and the Prometheus API error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors raised while parsing, rewriting or printing a query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The query text is not valid PromQL
    #[error("promql parse error in {query:?}: {message}")]
    QuerySyntax { query: String, message: String },

    /// The tenant path segment does not yield a usable filter
    #[error("malformed tenant filter {filter:?}: {message}")]
    MalformedFilter { filter: String, message: String },

    /// The printed query does not carry the filter on every selector
    #[error("rewritten query {query:?} is not isolated: {reason}")]
    Unisolated { query: String, reason: String },
}

/// Errors surfaced to the caller of the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unsupported method {0}")]
    UnsupportedMethod(String),

    #[error("Unsupported path {0}")]
    UnsupportedPath(String),

    #[error("Unsupported request {0}")]
    Unsupported(String),

    #[error("missing required parameter {0:?}")]
    MissingParameter(&'static str),

    #[error("expected exactly one {name:?} parameter, got {count}")]
    ParameterCount { name: &'static str, count: usize },

    #[error("invalid form: {0}")]
    InvalidForm(String),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::UnsupportedMethod(_)
            | ProxyError::UnsupportedPath(_)
            | ProxyError::Unsupported(_)
            | ProxyError::MissingParameter(_)
            | ProxyError::ParameterCount { .. }
            | ProxyError::InvalidForm(_)
            | ProxyError::Rewrite(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// `errorType` value of the Prometheus HTTP API error envelope
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::Upstream(_) => "unavailable",
            _ => "bad_data",
        }
    }

    /// True when the caller is at fault
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "status": "error",
            "errorType": self.error_type(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_request() {
        let errors = [
            ProxyError::UnsupportedMethod("PUT".to_string()),
            ProxyError::UnsupportedPath("/api/v1/write".to_string()),
            ProxyError::Unsupported("/metrics".to_string()),
            ProxyError::MissingParameter("query"),
            ProxyError::ParameterCount {
                name: "query",
                count: 2,
            },
            ProxyError::InvalidForm("body too large".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
            assert_eq!(err.error_type(), "bad_data");
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_rewrite_errors_are_bad_request() {
        let err = ProxyError::from(RewriteError::QuerySyntax {
            query: "up{".to_string(),
            message: "unexpected end of input".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ProxyError::from(RewriteError::MalformedFilter {
            filter: "a=".to_string(),
            message: "expected a string literal".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_errors_are_bad_gateway() {
        let err = ProxyError::Upstream("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_type(), "unavailable");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_rewrite_error_display() {
        let err = RewriteError::MalformedFilter {
            filter: "{a=}".to_string(),
            message: "expected a string literal".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"malformed tenant filter "{a=}": expected a string literal"#
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ProxyError::MissingParameter("query").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
