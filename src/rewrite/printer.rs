//! PromQL text printer
//!
//! Lays a tree out the same way as the grammar's `Display`, but quotes
//! string literals and label values the way Prometheus reads them back:
//! only `"`, `\` and control characters are escaped, every other character
//! is written as is.
//!
//! # Examples
//!
//! ```
//! use rusty_promql_proxy::rewrite::printer::quote;
//!
//! assert_eq!(quote("it's"), r#""it's""#);
//! assert_eq!(quote("Zürich"), r#""Zürich""#);
//! assert_eq!(quote("a\"b\\c\n"), r#""a\"b\\c\n""#);
//! ```

use std::fmt::{self, Write};

use rusty_promql_parser::{Expr, LabelMatcher, MatrixSelector, VectorSelector};

/// Quote a string as a double-quoted PromQL literal
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if c.is_control() && c.is_ascii() => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Display adapter that prints an expression tree as query text
pub struct Query<'a>(pub &'a Expr);

/// Display adapter that prints a vector selector with its modifiers
pub struct Selector<'a>(pub &'a VectorSelector);

impl fmt::Display for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Number(_) => write!(f, "{}", self.0),
            Expr::String(s) => f.write_str(&quote(s)),
            Expr::VectorSelector(selector) => write!(f, "{}", Selector(selector)),
            Expr::MatrixSelector(matrix) => write_matrix(f, matrix),
            Expr::Call(call) => {
                write!(f, "{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Query(arg))?;
                }
                f.write_char(')')
            }
            Expr::Aggregation(agg) => {
                f.write_str(&agg.op)?;
                if let Some(grouping) = &agg.grouping {
                    write!(f, " {} ", grouping)?;
                }
                f.write_char('(')?;
                if let Some(param) = &agg.param {
                    write!(f, "{}, ", Query(param))?;
                }
                write!(f, "{})", Query(&agg.expr))
            }
            Expr::Binary(binary) => {
                write!(f, "{} {}", Query(&binary.lhs), binary.op)?;
                if let Some(modifier) = binary.modifier.as_ref().filter(|m| !m.is_empty()) {
                    write!(f, " {}", modifier)?;
                }
                write!(f, " {}", Query(&binary.rhs))
            }
            Expr::Unary(unary) => write!(f, "{}{}", unary.op, Query(&unary.expr)),
            Expr::Paren(inner) => write!(f, "({})", Query(&**inner)),
            Expr::Subquery(subquery) => {
                write!(f, "{}[{}:", Query(&subquery.expr), subquery.range)?;
                if let Some(step) = &subquery.step {
                    write!(f, "{}", step)?;
                }
                f.write_char(']')?;
                if let Some(at) = &subquery.at {
                    write!(f, " {}", at)?;
                }
                if let Some(offset) = &subquery.offset {
                    write!(f, " offset {}", offset)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Selector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_name_and_matchers(f, self.0)?;
        write_modifiers(f, self.0)
    }
}

/// `name{matchers}[range]` followed by the selector's modifiers
fn write_matrix(f: &mut fmt::Formatter<'_>, matrix: &MatrixSelector) -> fmt::Result {
    write_name_and_matchers(f, &matrix.selector)?;
    write!(f, "[{}]", matrix.range)?;
    write_modifiers(f, &matrix.selector)
}

fn write_name_and_matchers(f: &mut fmt::Formatter<'_>, selector: &VectorSelector) -> fmt::Result {
    if let Some(name) = &selector.name {
        f.write_str(name)?;
    }
    if !selector.matchers.is_empty() {
        f.write_char('{')?;
        for (i, matcher) in selector.matchers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_matcher(f, matcher)?;
        }
        f.write_char('}')?;
    }
    Ok(())
}

fn write_matcher(f: &mut fmt::Formatter<'_>, matcher: &LabelMatcher) -> fmt::Result {
    write!(f, "{}{}{}", matcher.name, matcher.op, quote(&matcher.value))
}

/// `@` comes before `offset`
fn write_modifiers(f: &mut fmt::Formatter<'_>, selector: &VectorSelector) -> fmt::Result {
    if let Some(at) = &selector.at {
        write!(f, " {}", at)?;
    }
    if let Some(offset) = &selector.offset {
        write!(f, " offset {}", offset)?;
    }
    Ok(())
}
