//! CLI tool for testing sfcd
//!
//! # Usage
//!
//! Pick a file through the broker:
//! ```bash
//! sfcd-cli --remote open --title "Import Data" --folder ~/Documents
//! ```
//!
//! Save, asking before overwriting:
//! ```bash
//! sfcd-cli save --title "Export" --name report.csv
//! ```
//!
//! Check the broker:
//! ```bash
//! sfcd-cli ping
//! sfcd-cli info
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sfcd::config::{Config, DispatchMode};
use sfcd::{
    Backend, BrokerConnection, ButtonSpec, ChooserAction, Dialog, DialogNotification,
    DialogState, ResponseType, RunDone, UiContext,
};

#[derive(Parser, Debug)]
#[command(name = "sfcd-cli")]
#[command(about = "CLI tool for testing the sfcd file chooser broker")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.config/sfcd/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Always go through the broker
    #[arg(long, global = true, conflicts_with = "local")]
    remote: bool,

    /// Always run the dialog in this process
    #[arg(long, global = true)]
    local: bool,

    /// Give up waiting after this many seconds (0 for no timeout)
    #[arg(long, global = true, default_value = "0")]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(ClapArgs, Debug)]
struct ChooserOptions {
    /// Dialog window title
    #[arg(long, short)]
    title: Option<String>,
    /// Folder to start in
    #[arg(long, short)]
    folder: Option<PathBuf>,
    /// Suggested name for a new file or folder
    #[arg(long, short)]
    name: Option<String>,
    /// Allow selecting several items
    #[arg(long)]
    multiple: bool,
    /// Show hidden files
    #[arg(long)]
    show_hidden: bool,
    /// Extra shortcut folders
    #[arg(long = "shortcut")]
    shortcuts: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Choose existing files
    Open(ChooserOptions),

    /// Choose a file name to save to
    Save(ChooserOptions),

    /// Choose a folder
    SelectFolder(ChooserOptions),

    /// Check broker status
    Ping,

    /// Get broker info
    Info,
}

/// What the CLI prints after a run
#[derive(Debug, Serialize)]
struct ChooserResult {
    id: String,
    response: ResponseType,
    state: DialogState,
    destroyed: bool,
    files: Vec<PathBuf>,
    uris: Vec<String>,
    completed_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    let mode = if args.remote {
        DispatchMode::Remote
    } else if args.local {
        DispatchMode::Local
    } else {
        config.client.dispatch
    };
    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));

    let (action, options) = match args.command {
        Commands::Ping => {
            let broker = BrokerConnection::new(config.bus.clone(), config.client.reconnect);
            println!("{}", broker.ping().await?);
            return Ok(());
        }
        Commands::Info => {
            let broker = BrokerConnection::new(config.bus.clone(), config.client.reconnect);
            let info: serde_json::Value = serde_json::from_str(&broker.info().await?)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }
        Commands::Open(options) => (ChooserAction::Open, options),
        Commands::Save(options) => (ChooserAction::Save, options),
        Commands::SelectFolder(options) => (ChooserAction::SelectFolder, options),
    };

    let backend = Backend::from_config(&config, mode, UiContext::current());
    let result = choose(&backend, action, options, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.files.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn default_title(action: ChooserAction) -> &'static str {
    match action {
        ChooserAction::Open => "Open File",
        ChooserAction::Save => "Save File",
        ChooserAction::SelectFolder => "Select Folder",
        ChooserAction::CreateFolder => "Create Folder",
    }
}

async fn choose(
    backend: &Backend,
    action: ChooserAction,
    options: ChooserOptions,
    timeout: Option<Duration>,
) -> anyhow::Result<ChooserResult> {
    let title = options
        .title
        .unwrap_or_else(|| default_title(action).to_string());
    let dialog = backend
        .new_dialog(&title, None, action, ButtonSpec::standard_pair(action))
        .await?;
    let mut events = dialog.subscribe();
    info!("Created dialog {}", dialog.get_id());

    if let Some(folder) = &options.folder {
        let folder = std::fs::canonicalize(folder)
            .with_context(|| format!("Cannot resolve {}", folder.display()))?;
        dialog.set_current_folder(&folder).await?;
    }
    if let Some(name) = &options.name {
        dialog.set_current_name(name).await?;
    }
    dialog.set_select_multiple(options.multiple).await?;
    dialog.set_show_hidden(options.show_hidden).await?;
    if action == ChooserAction::Save {
        dialog.set_do_overwrite_confirmation(true).await?;
    }
    for shortcut in &options.shortcuts {
        if !dialog.add_shortcut_folder(shortcut).await? {
            debug!("Shortcut {} not added", shortcut.display());
        }
    }

    dialog.run().await?;
    let done = match timeout {
        Some(limit) => tokio::time::timeout(limit, wait_run_done(&dialog, &mut events))
            .await
            .context("Timed out waiting for the dialog")??,
        None => wait_run_done(&dialog, &mut events).await?,
    };

    let (files, uris) = if done.state == DialogState::DataRetrieval {
        (dialog.get_filenames().await?, dialog.get_uris().await?)
    } else {
        (Vec::new(), Vec::new())
    };

    // A destroyed dialog is already gone on the broker side
    if !done.destroyed {
        dialog.destroy().await?;
    }

    Ok(ChooserResult {
        id: done.id,
        response: done.response,
        state: done.state,
        destroyed: done.destroyed,
        files,
        uris,
        completed_at: Utc::now(),
    })
}

async fn wait_run_done(
    dialog: &Dialog,
    events: &mut tokio::sync::broadcast::Receiver<DialogNotification>,
) -> anyhow::Result<RunDone> {
    loop {
        match events.recv().await {
            Ok(DialogNotification::RunDone(done)) if done.id == dialog.get_id() => return Ok(done),
            Ok(DialogNotification::Destroyed { id }) => bail!("Dialog {} was destroyed", id),
            Ok(other) => debug!("Dialog event: {:?}", other),
            Err(RecvError::Lagged(skipped)) => debug!("Skipped {} dialog events", skipped),
            Err(RecvError::Closed) => bail!("Dialog event stream closed"),
        }
    }
}
