//! Form decoding and per-parameter rewriting
//!
//! Parameters arrive in the URL query string and, for form `POST`s, in the
//! body. Both are merged into one multi-valued [`Form`] with body values
//! first. [`rewrite_params`] then applies the per-type preconditions and the
//! per-key policy:
//!
//! | key | handling |
//! |-----|----------|
//! | `query` | exactly one value, rewritten |
//! | `match[]` | every value rewritten |
//! | `start`, `end`, `step`, `time`, `limit`, `timeout` | copied verbatim |
//! | anything else | dropped with a warning |

use std::collections::BTreeMap;

use tracing::warn;
use url::form_urlencoded;

use crate::error::ProxyError;
use crate::rewrite::filter::Filter;
use crate::rewrite::query::EMPTY_SELECTOR;
use crate::rewrite::{UnfilteredPolicy, add_query_filter};
use crate::router::ApiType;

pub const QUERY_PARAM: &str = "query";
pub const MATCH_PARAM: &str = "match[]";

/// Parameters forwarded without inspection
pub const PASSTHROUGH_PARAMS: &[&str] = &["start", "end", "step", "time", "limit", "timeout"];

/// Multi-valued form, keys in sorted order
pub type Form = BTreeMap<String, Vec<String>>;

/// Merge an urlencoded body and a URL query string, body values first
pub fn parse_form(body: &[u8], query: Option<&str>) -> Form {
    let mut form = Form::new();
    let pairs = form_urlencoded::parse(body)
        .chain(form_urlencoded::parse(query.unwrap_or_default().as_bytes()));

    for (key, value) in pairs {
        form.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    form
}

/// Rewrite every query-language parameter of `form` for the tenant
///
/// Returns the outbound parameters in key order. Fails on the first
/// parameter that cannot be rewritten.
pub fn rewrite_params(
    api_type: ApiType,
    mut form: Form,
    filter: &Filter,
    policy: UnfilteredPolicy,
) -> Result<Vec<(String, String)>, ProxyError> {
    match api_type {
        ApiType::Query => {
            if !form.contains_key(QUERY_PARAM) {
                return Err(ProxyError::MissingParameter(QUERY_PARAM));
            }
        }
        ApiType::Match => {
            form.entry(MATCH_PARAM.to_string())
                .or_insert_with(|| vec![EMPTY_SELECTOR.to_string()]);
        }
        ApiType::Plain => {}
    }

    let mut params = Vec::with_capacity(form.len());
    for (key, values) in form {
        match key.as_str() {
            QUERY_PARAM => {
                let [query] = values.as_slice() else {
                    return Err(ProxyError::ParameterCount {
                        name: QUERY_PARAM,
                        count: values.len(),
                    });
                };
                let rewritten = add_query_filter(filter, query, policy)?;
                params.push((QUERY_PARAM.to_string(), rewritten));
            }
            MATCH_PARAM => {
                for value in &values {
                    let rewritten = add_query_filter(filter, value, policy)?;
                    params.push((key.clone(), rewritten));
                }
            }
            k if PASSTHROUGH_PARAMS.contains(&k) => {
                params.extend(values.into_iter().map(|v| (key.clone(), v)));
            }
            _ => {
                warn!(param = %key, values = ?values, "dropping unknown parameter");
            }
        }
    }

    Ok(params)
}
