//! `cellimg`: inspect partition images and signatures in a filesystem
//! image store.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use envconfig::Envconfig;
use imagestore::ImageStoreConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Envconfig)]
struct LogConfig {
    #[envconfig(from = "CELLIMG_LOG_LEVEL", default = "info")]
    level: String,
}

#[derive(Debug, Parser)]
#[command(name = "cellimg", version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Store root directory [env: CELLIMG_ROOT]
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Container name [env: CELLIMG_CONTAINER]
    #[arg(long, global = true)]
    container: Option<String>,

    /// Folder inside the container [env: CELLIMG_FOLDER]
    #[arg(long, global = true)]
    folder: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Decode a partition image and list its cells.
    Inspect {
        partition: u32,
        /// Print totals only.
        #[arg(short, long)]
        summary: bool,
    },
    /// Print the stored signature of a partition.
    Signature { partition: u32 },
    /// Compare a partition's signature against its image.
    Status { partition: u32 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = LogConfig::init_from_env().context("reading log configuration")?;
    init_tracing(&log.level, cli.verbose)?;

    let mut config = ImageStoreConfig::from_env().context("reading store configuration")?;
    if let Some(root) = cli.root {
        config.root = root;
    }
    if let Some(container) = cli.container {
        config.container = container;
    }
    if let Some(folder) = cli.folder {
        config.folder = folder;
    }
    tracing::debug!(?config, "using image store");

    let store = commands::open_store(&config);
    let mut out = io::stdout().lock();
    match cli.command {
        Commands::Inspect { partition, summary } => {
            commands::inspect(&store, partition, summary, &mut out)
        }
        Commands::Signature { partition } => commands::signature(&store, partition, &mut out),
        Commands::Status { partition } => commands::status(&store, partition, &mut out),
    }
}

/// `RUST_LOG` wins when set; otherwise `level`, raised by each `-v`.
fn init_tracing(level: &str, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("bad log level `{level}`"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}
