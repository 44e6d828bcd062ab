//! Command line and environment configuration

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use nom::{Parser as _, combinator::all_consuming};
use rusty_promql_parser::lexer::identifier::label_name;
use url::Url;

use crate::rewrite::UnfilteredPolicy;

/// Multi-tenant PromQL isolation proxy
#[derive(Parser, Debug, Clone)]
#[command(name = "rusty-promql-proxy", version, about)]
pub struct Config {
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Upstream address, `host:port` or a full `http(s)://` URL
    #[arg(long = "upstream.addr", env = "PROMQL_PROXY_UPSTREAM_ADDR")]
    pub upstream_addr: String,

    /// Path prefix prepended to the API path of every upstream request
    #[arg(
        long = "upstream.prefix-path",
        env = "PROMQL_PROXY_UPSTREAM_PREFIX_PATH",
        default_value = ""
    )]
    pub upstream_prefix_path: String,

    /// Address to listen on
    #[arg(long = "proxy.listen-addr", env = "PROMQL_PROXY_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Label that bare tenant identifiers are matched against
    #[arg(
        long = "tenant.label",
        env = "PROMQL_PROXY_TENANT_LABEL",
        default_value = "tenant"
    )]
    pub tenant_label: String,

    /// Upstream connect timeout in seconds
    #[arg(
        long = "upstream.connect-timeout",
        env = "PROMQL_PROXY_UPSTREAM_CONNECT_TIMEOUT",
        default_value_t = 10
    )]
    pub upstream_connect_timeout: u64,

    /// What to do with a rewritten query that cannot be verified: reject or forward
    #[arg(
        long = "rewrite.unfiltered",
        env = "PROMQL_PROXY_REWRITE_UNFILTERED",
        default_value_t = UnfilteredPolicy::Reject
    )]
    pub unfiltered: UnfilteredPolicy,
}

impl Config {
    /// The upstream as a URL, `http://` assumed when no scheme is given
    pub fn upstream_url(&self) -> Result<Url> {
        let addr = self.upstream_addr.trim();
        let url = if addr.contains("://") {
            Url::parse(addr)
        } else {
            Url::parse(&format!("http://{}", addr))
        }
        .with_context(|| format!("invalid upstream address {:?}", self.upstream_addr))?;

        if !matches!(url.scheme(), "http" | "https") {
            bail!("unsupported upstream scheme {:?}", url.scheme());
        }
        if url.host_str().is_none() {
            bail!("upstream address {:?} has no host", self.upstream_addr);
        }
        Ok(url)
    }

    /// The prefix path without a trailing `/`
    pub fn prefix_path(&self) -> &str {
        self.upstream_prefix_path.trim_end_matches('/')
    }

    pub fn listen_socket(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.listen_addr))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout)
    }

    /// Check every setting before the server starts
    pub fn validate(&self) -> Result<()> {
        self.listen_socket()?;
        self.upstream_url()?;

        let prefix = self.prefix_path();
        if !prefix.is_empty() && !prefix.starts_with('/') {
            bail!("upstream prefix path {:?} must start with '/'", prefix);
        }

        if all_consuming(label_name).parse(self.tenant_label.as_str()).is_err() {
            bail!("tenant label {:?} is not a valid label name", self.tenant_label);
        }

        if self.upstream_connect_timeout == 0 {
            bail!("upstream connect timeout must be at least one second");
        }

        Ok(())
    }
}
