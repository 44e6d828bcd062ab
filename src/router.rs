//! Request path classification
//!
//! Inbound paths have the shape `/<tenant>/api/v<…>`. The tenant is a single
//! path segment; the API path is checked against the allow-list of backend
//! operations the proxy knows how to rewrite.
//!
//! | type | API paths |
//! |------|-----------|
//! | [`ApiType::Query`] | `/api/v1/query`, `/api/v1/query_range`, `/api/v1/query_exemplars` |
//! | [`ApiType::Match`] | `/api/v1/series`, `/api/v1/labels`, `/api/v1/label/<name>/values` |
//! | [`ApiType::Plain`] | `/api/v1/format_query` |

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::anychar,
    combinator::{all_consuming, recognize, rest, value},
    sequence::{delimited, preceded},
};

use crate::error::ProxyError;

/// How an API operation carries its PromQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiType {
    /// One expression in a required `query` parameter
    Query,
    /// Zero or more expressions in a repeatable `match[]` parameter
    Match,
    /// No required query-language parameter
    Plain,
}

/// A classified inbound request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<'a> {
    /// Tenant path segment: matcher text or a bare identifier
    pub tenant: &'a str,
    /// Backend API path, starting with `/api/`
    pub api_path: &'a str,
    pub api_type: ApiType,
}

/// Classify a percent-decoded request path
pub fn classify(path: &str) -> Result<Route<'_>, ProxyError> {
    let (_, (tenant, api_path)) =
        tenant_path(path).map_err(|_| ProxyError::Unsupported(path.to_string()))?;

    let (_, api_type) =
        api_type(api_path).map_err(|_| ProxyError::UnsupportedPath(api_path.to_string()))?;

    Ok(Route {
        tenant,
        api_path,
        api_type,
    })
}

/// `/<tenant>/api/v<anything>`
fn tenant_path(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming((
        preceded(tag("/"), take_while1(|c: char| c != '/')),
        recognize((tag("/api/v"), anychar, rest)),
    ))
    .parse(input)
}

fn api_type(input: &str) -> IResult<&str, ApiType> {
    all_consuming(preceded(
        tag("/api/v1/"),
        alt((
            value(ApiType::Query, query_operation),
            value(ApiType::Match, match_operation),
            value(ApiType::Plain, tag("format_query")),
        )),
    ))
    .parse(input)
}

fn query_operation(input: &str) -> IResult<&str, &str> {
    // Longest first, `query` is a prefix of the others
    alt((tag("query_range"), tag("query_exemplars"), tag("query"))).parse(input)
}

fn match_operation(input: &str) -> IResult<&str, &str> {
    alt((
        tag("series"),
        tag("labels"),
        recognize(delimited(
            tag("label/"),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
            tag("/values"),
        )),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> Route<'_> {
        classify(path).unwrap_or_else(|e| panic!("failed to classify '{}': {}", path, e))
    }

    #[test]
    fn test_query_paths() {
        for op in ["query", "query_range", "query_exemplars"] {
            let path = format!("/t1/api/v1/{}", op);
            let r = route(&path);
            assert_eq!(r.tenant, "t1");
            assert_eq!(r.api_path, &path[3..]);
            assert_eq!(r.api_type, ApiType::Query);
        }
    }

    #[test]
    fn test_match_paths() {
        for path in [
            "/t1/api/v1/series",
            "/t1/api/v1/labels",
            "/t1/api/v1/label/job/values",
            "/t1/api/v1/label/__name__/values",
        ] {
            assert_eq!(route(path).api_type, ApiType::Match, "{}", path);
        }
    }

    #[test]
    fn test_plain_path() {
        let r = route("/t1/api/v1/format_query");
        assert_eq!(r.api_type, ApiType::Plain);
        assert_eq!(r.api_path, "/api/v1/format_query");
    }

    #[test]
    fn test_matcher_tenant_segment() {
        let r = route(r#"/tenant="t1"/api/v1/query"#);
        assert_eq!(r.tenant, r#"tenant="t1""#);
        assert_eq!(r.api_path, "/api/v1/query");
    }

    #[test]
    fn test_unsupported_shape() {
        for path in [
            "/",
            "/t1",
            "/t1/",
            "/t1/metrics",
            "//api/v1/query",
            "/t1/api/v",
            "t1/api/v1/query",
        ] {
            assert!(
                matches!(classify(path), Err(ProxyError::Unsupported(_))),
                "expected '{}' to be unsupported",
                path
            );
        }
    }

    #[test]
    fn test_unsupported_api_path() {
        for path in [
            "/t1/api/v1/unsupported_op",
            "/t1/api/v1/query/extra",
            "/t1/api/v1/queryx",
            "/t1/api/v2/query",
            "/t1/api/v1/label/job-name/values",
            "/t1/api/v1/label//values",
            "/t1/api/v1/write",
            "/t1/api/v1/series/",
        ] {
            assert!(
                matches!(classify(path), Err(ProxyError::UnsupportedPath(_))),
                "expected '{}' to be an unsupported path, got {:?}",
                path,
                classify(path)
            );
        }
    }
}
