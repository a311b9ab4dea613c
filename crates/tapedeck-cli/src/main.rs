//! tapedeck - inspect recorded interaction timelines.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tapedeck_cli::{commands, config, logging};
use tapedeck_core::{RecordingStore, Timeline};

use config::Config;
use logging::LogArgs;

/// Inspect the recordings in a Tapedeck timeline database.
#[derive(Parser, Debug)]
#[command(name = "tapedeck")]
#[command(about = "Inspect recorded interaction timelines")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override database path from config
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List recordings, newest first
    Recordings,
    /// Row counts for a recording
    Summary {
        /// Recording timestamp (default: latest)
        #[arg(short, long, value_name = "TS")]
        recording: Option<i64>,
    },
    /// Action events with the stop gesture removed
    Events {
        /// Recording timestamp (default: latest)
        #[arg(short, long, value_name = "TS")]
        recording: Option<i64>,
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Screenshots with their predecessor and cached diff status
    Screenshots {
        /// Recording timestamp (default: latest)
        #[arg(short, long, value_name = "TS")]
        recording: Option<i64>,
        /// Compute and store missing diffs first
        #[arg(long)]
        diff: bool,
    },
    /// Performance and memory samples
    Stats {
        /// Recording timestamp (default: latest)
        #[arg(short, long, value_name = "TS")]
        recording: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    cli.log.init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    tracing::info!(
        target: "tapedeck::startup",
        "Loaded configuration (db: {})",
        config.db_path.display()
    );

    let store = RecordingStore::open(&config.db_path)?;
    let timeline = Timeline::new(&store, &config.pipeline);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Recordings => commands::recordings(&timeline, &mut out),
        Command::Summary { recording } => commands::summary(&timeline, recording, &mut out),
        Command::Events { recording, json } => {
            commands::events(&timeline, recording, json, &mut out)
        }
        Command::Screenshots { recording, diff } => {
            commands::screenshots(&timeline, recording, diff, &mut out)
        }
        Command::Stats { recording } => commands::stats(&timeline, recording, &mut out),
    }
}
