//! Parser/printer facade over `rusty-promql-parser`
//!
//! Parsing requires the whole input to be consumed (trailing blanks and
//! comments aside) and accepts the bare empty selector `{}` as "match
//! everything". Printing goes through [`Query`], which keeps the grammar's
//! layout and quotes strings the way Prometheus reads them.

use nom::{
    IResult, Parser,
    character::complete::char,
    combinator::{all_consuming, value},
    sequence::terminated,
};
use rusty_promql_parser::lexer::whitespace::{whitespace0, ws_opt};
use rusty_promql_parser::{Expr, VectorSelector, expr};

use crate::error::RewriteError;
use crate::rewrite::filter::Filter;
use crate::rewrite::printer::Query;
use crate::rewrite::visitor::{IsolationCheck, walk_expr_mut};

/// The "match everything" selector, used when a matcher list is absent
pub const EMPTY_SELECTOR: &str = "{}";

/// Parse a complete PromQL query
pub fn parse_query(query: &str) -> Result<Expr, RewriteError> {
    if empty_selector(query).is_ok() {
        return Ok(Expr::VectorSelector(VectorSelector::with_matchers(
            Vec::new(),
        )));
    }

    all_consuming(terminated(expr, ws_opt))
        .parse(query)
        .map(|(_, ast)| ast)
        .map_err(|err| RewriteError::QuerySyntax {
            query: query.to_string(),
            message: describe_error(err),
        })
}

/// Print a (possibly rewritten) tree back to query text
pub fn print_query(ast: &Expr) -> String {
    Query(ast).to_string()
}

/// Re-parse printed text and check that every selector carries the filter
pub fn verify_isolated(printed: &str, filter: &Filter) -> Result<(), RewriteError> {
    let mut reparsed = parse_query(printed).map_err(|err| RewriteError::Unisolated {
        query: printed.to_string(),
        reason: format!("printed query does not parse back: {}", err),
    })?;

    let mut check = IsolationCheck::new(filter);
    walk_expr_mut(&mut check, &mut reparsed).unwrap_or_else(|never| match never {});

    if check.unfiltered.is_empty() {
        Ok(())
    } else {
        Err(RewriteError::Unisolated {
            query: printed.to_string(),
            reason: format!(
                "{} of {} selectors lack the filter: {}",
                check.unfiltered.len(),
                check.selectors,
                check.unfiltered.join(", ")
            ),
        })
    }
}

/// `{}` with optional blanks around and inside the braces
fn empty_selector(input: &str) -> IResult<&str, ()> {
    value(
        (),
        all_consuming((whitespace0, char('{'), whitespace0, char('}'), whitespace0)),
    )
    .parse(input)
}

/// Turn a nom error into a message for the caller
pub(crate) fn describe_error(err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Incomplete(_) => "unexpected end of input".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            if e.input.is_empty() {
                format!("unexpected end of input ({:?})", e.code)
            } else {
                format!("unexpected input at {:?} ({:?})", snippet(e.input), e.code)
            }
        }
    }
}

fn snippet(input: &str) -> &str {
    match input.char_indices().nth(32) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}
