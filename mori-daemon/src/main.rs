//! mori-daemon entry point.
//!
//! Parses CLI arguments, loads and validates `mori.toml`, initializes
//! logging and hands control to the supervisor.

use anyhow::Result;
use clap::Parser;

use mori_core::config::MoriConfig;
use mori_daemon::cli::DaemonCli;
use mori_daemon::logging;
use mori_daemon::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonCli::parse();

    let mut config = MoriConfig::load(&args.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", args.config.display(), e))?;

    // CLI overrides take precedence over file and environment
    if let Some(level) = &args.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &args.log_format {
        config.general.log_format.clone_from(format);
    }
    if let Some(pid_file) = &args.pid_file {
        config.general.pid_file.clone_from(pid_file);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if args.validate {
        println!(
            "configuration OK: {} server(s), {} enabled",
            config.servers.len(),
            config.enabled_servers().count()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "mori-daemon starting"
    );

    let mut supervisor = Supervisor::build_from_config(config).await?;
    supervisor.run().await?;

    tracing::info!("mori-daemon shut down");
    Ok(())
}
