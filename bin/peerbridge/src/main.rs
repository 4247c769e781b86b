use anyhow::Context;
use peerbridge_core::{Config, Paths};
use peerbridge_daemon::Supervisor;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout carries frames; all tracing goes to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let paths = Paths::new();
    paths
        .ensure_dirs()
        .context("failed to create the peerbridge base directory")?;

    let config_path = paths.config_file();
    let config = Config::load_or_default(&paths).context("failed to load config")?;
    if !config_path.exists() {
        config.save(&config_path).context("failed to write config")?;
        info!(path = %config_path.display(), "wrote default config");
    }

    Supervisor::new(config, paths).run().await?;
    Ok(())
}
