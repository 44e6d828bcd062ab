//! # Rusty PromQL Proxy
//!
//! A multi-tenant isolation proxy for the Prometheus HTTP API. Requests come
//! in as `/<tenant>/api/v1/...`; every PromQL expression they carry is parsed,
//! the tenant's label matchers are appended to every selector, and the
//! rewritten expression is forwarded to a single upstream.
//!
//! ## Quick Start
//!
//! The rewriting engine can be used on its own:
//!
//! ```rust
//! use rusty_promql_proxy::{Filter, UnfilteredPolicy, add_query_filter};
//!
//! let filter = Filter::from_tenant("t1", "tenant").unwrap();
//! let query = add_query_filter(
//!     &filter,
//!     r#"sum by (job) (rate(http_requests_total{code="500"}[5m]))"#,
//!     UnfilteredPolicy::Reject,
//! )
//! .unwrap();
//! assert_eq!(
//!     query,
//!     r#"sum by (job) (rate(http_requests_total{code="500", tenant="t1"}[5m]))"#
//! );
//! ```
//!
//! Tenants may also be given as a matcher list in the path segment,
//! e.g. `/org="a",env=~"prod|dev"/api/v1/query`.
//!
//! ## Modules
//!
//! - [`rewrite`] - Query rewriting engine (filter, visitor, parse/print facade)
//! - [`router`] - Request path classification
//! - [`proxy`] - Parameter rewriting and upstream forwarding
//! - [`server`] - HTTP front end
//! - [`config`] - Command line configuration
//! - [`error`] - Error types and the HTTP error envelope

pub mod config;
pub mod error;
pub mod proxy;
pub mod rewrite;
pub mod router;
pub mod server;

pub use config::Config;
pub use error::{ProxyError, RewriteError};
pub use rewrite::filter::Filter;
pub use rewrite::{UnfilteredPolicy, add_query_filter};
pub use router::{ApiType, Route, classify};
