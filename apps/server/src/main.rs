use anyhow::Context;
use stash_domain::config::ApiConfig;
use stash_kernel::config::init_config;
use stash_logger::Logger;
use stash_server::Server;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("STASH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let cfg: ApiConfig = init_config(&path).context("Critical: Configuration is malformed")?;

    let _log = Logger::builder().name(env!("CARGO_PKG_NAME")).config(&cfg.logging)?.init()?;
    tracing::info!(path = %path, "Configuration loaded");

    Server::builder().config(cfg).build().await?.run().await
}
