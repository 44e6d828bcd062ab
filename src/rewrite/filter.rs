//! Tenant filter construction
//!
//! A tenant is identified by the first segment of the request path. That
//! segment is either a bare identifier (`t1`), which becomes a single
//! equality matcher on the tenant label, or a pre-formed matcher list
//! (`tenant="t1",env=~"prod|dev"`), which is parsed with the grammar's own
//! label matcher parser.
//!
//! # Examples
//!
//! ```
//! use rusty_promql_proxy::rewrite::filter::Filter;
//!
//! let filter = Filter::from_tenant("t1", "tenant").unwrap();
//! assert_eq!(filter.to_string(), r#"{tenant="t1"}"#);
//!
//! let filter = Filter::from_tenant(r#"org="a", team!="b""#, "tenant").unwrap();
//! assert_eq!(filter.matchers().len(), 2);
//! ```

use std::fmt;

use nom::{IResult, Parser, combinator::all_consuming, sequence::terminated};
use rusty_promql_parser::lexer::whitespace::whitespace0;
use rusty_promql_parser::parser::selector::label_matchers;
use rusty_promql_parser::{LabelMatchOp, LabelMatcher, VectorSelector};

use crate::error::RewriteError;
use crate::rewrite::printer::Selector;
use crate::rewrite::query::describe_error;

/// Characters that mark a tenant segment as a matcher expression
const MATCHER_SYNTAX: &[char] = &['=', '!', '~', '"', '\'', '`', '{', '}', ','];

/// The ordered matchers that scope a query to one tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    matchers: Vec<LabelMatcher>,
}

impl Filter {
    /// Build the filter for a tenant path segment
    pub fn from_tenant(tenant: &str, tenant_label: &str) -> Result<Self, RewriteError> {
        if tenant.contains(MATCHER_SYNTAX) {
            Self::parse(tenant)
        } else {
            Self::from_matchers(vec![LabelMatcher::new(
                tenant_label,
                LabelMatchOp::Equal,
                tenant,
            )])
        }
    }

    /// Parse a pre-formed matcher list, with or without the surrounding braces
    pub fn parse(matchers: &str) -> Result<Self, RewriteError> {
        let trimmed = matchers.trim();
        let text = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            format!("{{{}}}", trimmed)
        };

        let (_, parsed) =
            matcher_expression(&text).map_err(|err| RewriteError::MalformedFilter {
                filter: matchers.to_string(),
                message: describe_error(err),
            })?;

        // A quoted metric name inside the braces arrives as a `__name__` matcher
        Self::from_matchers(parsed).map_err(|_| RewriteError::MalformedFilter {
            filter: matchers.to_string(),
            message: "filter has no matchers".to_string(),
        })
    }

    /// Wrap already-built matchers, rejecting an empty list
    pub fn from_matchers(matchers: Vec<LabelMatcher>) -> Result<Self, RewriteError> {
        if matchers.is_empty() {
            return Err(RewriteError::MalformedFilter {
                filter: String::new(),
                message: "filter has no matchers".to_string(),
            });
        }
        Ok(Self { matchers })
    }

    pub fn matchers(&self) -> &[LabelMatcher] {
        &self.matchers
    }

    /// Check that a selector carries every matcher of this filter
    pub fn is_applied_to(&self, selector: &VectorSelector) -> bool {
        let present = selector.all_matchers();
        self.matchers.iter().all(|m| present.contains(m))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selector = VectorSelector::with_matchers(self.matchers.clone());
        write!(f, "{}", Selector(&selector))
    }
}

/// `{matchers}` followed by optional blanks, and nothing else
fn matcher_expression(input: &str) -> IResult<&str, Vec<LabelMatcher>> {
    all_consuming(terminated(label_matchers, whitespace0)).parse(input)
}
