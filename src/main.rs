use std::path::PathBuf;

use bgin_hub::config::Config;
use bgin_hub::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("BGIN_CONFIG").ok().map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref())?;
    config.apply_env();

    server::run(config).await
}
