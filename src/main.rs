use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rusty_promql_proxy::{Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;

    info!(
        upstream = %config.upstream_addr,
        prefix = config.prefix_path(),
        listen = %config.listen_addr,
        tenant_label = %config.tenant_label,
        unfiltered = %config.unfiltered,
        "starting promql proxy"
    );

    server::serve(config).await
}
