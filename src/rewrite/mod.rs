//! Tenant query rewriting engine.
//!
//! This module turns a client's PromQL query into one that can only see the
//! tenant's series: the query is parsed, every selector in the tree receives
//! the tenant's matchers, and the tree is printed back to text.
//!
//! # Submodules
//!
//! - [`filter`] - Tenant filter construction
//! - [`printer`] - Query text printer with Prometheus string quoting
//! - [`query`] - Parser/printer facade and isolation check
//! - [`visitor`] - Tree walking and matcher injection
//!
//! # Example
//!
//! ```rust
//! use rusty_promql_proxy::rewrite::{UnfilteredPolicy, add_query_filter, filter::Filter};
//!
//! let filter = Filter::from_tenant("t1", "tenant").unwrap();
//! let query = add_query_filter(&filter, "rate(http_requests_total[5m])", UnfilteredPolicy::Reject).unwrap();
//! assert_eq!(query, r#"rate(http_requests_total{tenant="t1"}[5m])"#);
//! ```

pub mod filter;
pub mod printer;
pub mod query;
pub mod visitor;

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::RewriteError;
use filter::Filter;
use query::{parse_query, print_query, verify_isolated};
use visitor::{TenantVisitor, walk_expr_mut};

/// What to do when a printed query still contains a selector without the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnfilteredPolicy {
    /// Refuse the query
    #[default]
    Reject,
    /// Log a warning and forward the query as printed
    Forward,
}

impl FromStr for UnfilteredPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(UnfilteredPolicy::Reject),
            "forward" => Ok(UnfilteredPolicy::Forward),
            other => Err(format!(
                "unknown policy {:?}, expected \"reject\" or \"forward\"",
                other
            )),
        }
    }
}

impl fmt::Display for UnfilteredPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfilteredPolicy::Reject => write!(f, "reject"),
            UnfilteredPolicy::Forward => write!(f, "forward"),
        }
    }
}

/// Rewrite `query` so that every selector carries `filter`
pub fn add_query_filter(
    filter: &Filter,
    query: &str,
    policy: UnfilteredPolicy,
) -> Result<String, RewriteError> {
    let mut ast = parse_query(query).inspect_err(|err| debug!(error = %err, "parse failed"))?;

    let mut visitor = TenantVisitor::new(filter);
    walk_expr_mut(&mut visitor, &mut ast).unwrap_or_else(|never| match never {});
    let rewritten = print_query(&ast);

    if let Err(err) = verify_isolated(&rewritten, filter) {
        match policy {
            UnfilteredPolicy::Reject => {
                warn!(error = %err, "rejecting query that could not be isolated");
                return Err(err);
            }
            UnfilteredPolicy::Forward => {
                warn!(error = %err, "forwarding query that could not be isolated");
            }
        }
    }

    debug!(
        orig_query = query,
        new_query = %rewritten,
        selectors = visitor.selectors(),
        "rewrote query"
    );
    Ok(rewritten)
}
