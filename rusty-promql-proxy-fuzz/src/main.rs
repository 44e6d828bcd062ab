use std::convert::Infallible;

use afl::fuzz;
use rusty_promql_parser::Expr;
use rusty_promql_proxy::rewrite::query::{parse_query, verify_isolated};
use rusty_promql_proxy::rewrite::visitor::{VisitorMut, walk_expr_mut};
use rusty_promql_proxy::{Filter, UnfilteredPolicy, add_query_filter};

/// Counts vector and matrix selectors
struct SelectorCount(usize);

impl VisitorMut for SelectorCount {
    type Error = Infallible;

    fn pre_visit(&mut self, expr: &mut Expr) -> Result<bool, Self::Error> {
        if matches!(expr, Expr::VectorSelector(_) | Expr::MatrixSelector(_)) {
            self.0 += 1;
        }
        Ok(true)
    }
}

fn selectors(ast: &mut Expr) -> usize {
    let mut count = SelectorCount(0);
    walk_expr_mut(&mut count, ast).unwrap_or_else(|never| match never {});
    count.0
}

fn main() {
    let filter = Filter::from_tenant("zürich", "tenant").expect("static filter");

    fuzz!(|data: &[u8]| {
        let Ok(s) = std::str::from_utf8(data) else {
            return;
        };
        let Ok(mut original) = parse_query(s) else {
            return;
        };

        // Every query the grammar accepts must come out isolated and readable
        let rewritten = add_query_filter(&filter, s, UnfilteredPolicy::Reject)
            .unwrap_or_else(|err| panic!("{:?} was not rewritten: {}", s, err));
        let mut reparsed = parse_query(&rewritten)
            .unwrap_or_else(|err| panic!("{:?} does not parse back: {}", rewritten, err));

        assert_eq!(selectors(&mut original), selectors(&mut reparsed), "{}", rewritten);
        assert!(verify_isolated(&rewritten, &filter).is_ok(), "{}", rewritten);
    });
}
