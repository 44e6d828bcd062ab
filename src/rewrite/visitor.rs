//! Mutable tree walking and tenant filter injection
//!
//! [`walk_expr_mut`] visits every node of an [`Expr`] tree exactly once in
//! pre-order. [`TenantVisitor`] uses it to append the tenant's matchers to
//! every selector in the tree.

use std::convert::Infallible;

use rusty_promql_parser::{Expr, VectorSelector};
use tracing::{debug, trace};

use crate::rewrite::filter::Filter;
use crate::rewrite::printer::Selector;

/// A visitor that may mutate the nodes it is handed
pub trait VisitorMut {
    type Error;

    /// Called before the children of `expr` are walked.
    /// Returning `false` skips the children.
    fn pre_visit(&mut self, expr: &mut Expr) -> Result<bool, Self::Error>;
}

/// Walk `expr` in pre-order, handing every node to `visitor`
pub fn walk_expr_mut<V: VisitorMut>(visitor: &mut V, expr: &mut Expr) -> Result<(), V::Error> {
    if !visitor.pre_visit(expr)? {
        return Ok(());
    }

    match expr {
        Expr::Number(_) | Expr::String(_) | Expr::VectorSelector(_) | Expr::MatrixSelector(_) => {}
        Expr::Call(call) => {
            for arg in call.args.iter_mut() {
                walk_expr_mut(visitor, arg)?;
            }
        }
        Expr::Aggregation(agg) => {
            if let Some(param) = agg.param.as_mut() {
                walk_expr_mut(visitor, param)?;
            }
            walk_expr_mut(visitor, &mut agg.expr)?;
        }
        Expr::Binary(binary) => {
            walk_expr_mut(visitor, &mut binary.lhs)?;
            walk_expr_mut(visitor, &mut binary.rhs)?;
        }
        Expr::Unary(unary) => walk_expr_mut(visitor, &mut unary.expr)?,
        Expr::Paren(inner) => walk_expr_mut(visitor, inner)?,
        Expr::Subquery(subquery) => walk_expr_mut(visitor, &mut subquery.expr)?,
    }

    Ok(())
}

/// Short name of a node kind, for logs
pub fn node_kind(expr: &Expr) -> &'static str {
    match expr {
        Expr::Number(_) => "number",
        Expr::String(_) => "string",
        Expr::VectorSelector(_) => "vector_selector",
        Expr::MatrixSelector(_) => "matrix_selector",
        Expr::Call(_) => "call",
        Expr::Aggregation(_) => "aggregation",
        Expr::Binary(_) => "binary",
        Expr::Unary(_) => "unary",
        Expr::Paren(_) => "paren",
        Expr::Subquery(_) => "subquery",
    }
}

/// Appends a tenant's matchers to every selector it visits
pub struct TenantVisitor<'a> {
    filter: &'a Filter,
    selectors: usize,
}

impl<'a> TenantVisitor<'a> {
    pub fn new(filter: &'a Filter) -> Self {
        Self {
            filter,
            selectors: 0,
        }
    }

    /// Number of selectors that received the filter so far
    pub fn selectors(&self) -> usize {
        self.selectors
    }

    fn add_filter(&mut self, selector: &mut VectorSelector) {
        selector
            .matchers
            .extend(self.filter.matchers().iter().cloned());
        self.selectors += 1;
        debug!(selector = %Selector(selector), "added filter");
    }
}

impl VisitorMut for TenantVisitor<'_> {
    type Error = Infallible;

    fn pre_visit(&mut self, expr: &mut Expr) -> Result<bool, Self::Error> {
        trace!(node = node_kind(expr), "visit");
        // The grammar's node set is closed: a new variant must be classified here
        // before the crate compiles again.
        match expr {
            Expr::VectorSelector(selector) => self.add_filter(selector),
            Expr::MatrixSelector(matrix) => self.add_filter(&mut matrix.selector),
            Expr::Number(_)
            | Expr::String(_)
            | Expr::Call(_)
            | Expr::Aggregation(_)
            | Expr::Binary(_)
            | Expr::Unary(_)
            | Expr::Paren(_)
            | Expr::Subquery(_) => {}
        }
        Ok(true)
    }
}

/// Counts selectors that do not carry a filter
pub(crate) struct IsolationCheck<'a> {
    filter: &'a Filter,
    pub(crate) selectors: usize,
    pub(crate) unfiltered: Vec<String>,
}

impl<'a> IsolationCheck<'a> {
    pub(crate) fn new(filter: &'a Filter) -> Self {
        Self {
            filter,
            selectors: 0,
            unfiltered: Vec::new(),
        }
    }

    fn check(&mut self, selector: &VectorSelector) {
        self.selectors += 1;
        if !self.filter.is_applied_to(selector) {
            self.unfiltered.push(Selector(selector).to_string());
        }
    }
}

impl VisitorMut for IsolationCheck<'_> {
    type Error = Infallible;

    fn pre_visit(&mut self, expr: &mut Expr) -> Result<bool, Self::Error> {
        match expr {
            Expr::VectorSelector(selector) => self.check(selector),
            Expr::MatrixSelector(matrix) => self.check(&matrix.selector),
            _ => {}
        }
        Ok(true)
    }
}
