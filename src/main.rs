//! sfcd broker daemon
//!
//! Runs file chooser dialogs on behalf of confined clients.
//!
//! # Architecture
//!
//! - Dedicated UI thread: single-threaded runtime owning native dialogs and
//!   their run-loop bridges
//! - Background tokio runtime: D-Bus method calls and signal delivery
//!
//! # Usage
//!
//! ```bash
//! sfcd
//! sfcd --headless          # dialogs never appear (testing)
//! sfcd --config ./sfcd.toml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sfcd::config::{Config, ToolkitKind};
use sfcd::{start_broker_service, FileChooserBroker, LocalBackend, UiThread};

#[derive(Parser, Debug)]
#[command(name = "sfcd")]
#[command(about = "File chooser broker for sandboxed applications")]
#[command(version)]
struct Args {
    /// Use the headless toolkit (dialogs never appear, for testing)
    #[arg(long)]
    headless: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file (default: ~/.config/sfcd/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting sfcd v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if args.headless {
        config.broker.toolkit = ToolkitKind::Headless;
    }

    let ui = UiThread::spawn(&config.broker.ui_thread_name)
        .context("Failed to start the UI thread")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .build()
        .context("Failed to build tokio runtime")?;

    let local = LocalBackend::from_config(&config.broker, ui.context());
    info!("Native toolkit: {}", local.toolkit_name());

    rt.block_on(async {
        let _connection = start_broker_service(&config.bus, FileChooserBroker::new(local))
            .await
            .context("Failed to start D-Bus service (is the bus running?)")?;

        info!("Press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
        Ok::<_, anyhow::Error>(())
    })?;

    drop(rt);
    ui.shutdown();
    Ok(())
}
