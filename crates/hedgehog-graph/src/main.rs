//! Command-line front end that snapshots recorded debug sessions.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use hedgehog_dap::{DebugSession, ReplaySession, SnapshotTracker, StopGeneration, Transcript};
use hedgehog_graph::{take_snapshot, HedgehogConfig, VisualizationMode};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "hedgehog",
    version,
    about = "Render a paused program's variables as a memory graph",
    after_help = "Examples:\n  hedgehog snapshot --transcript stop.json\n  hedgehog snapshot --transcript stop.json --mode graph --show-addresses\n  hedgehog check-config hedgehog.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Snapshot a recorded stop.
    Snapshot {
        /// Recorded session transcript (JSON).
        #[arg(long, value_name = "FILE")]
        transcript: PathBuf,
        /// Config file (defaults to hedgehog.toml in the working directory).
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Output syntax: memory-blocks or graph.
        #[arg(long)]
        mode: Option<VisualizationMode>,
        /// Annotate nodes with addresses and memory previews.
        #[arg(long)]
        show_addresses: bool,
        /// Write the document to a file instead of stdout.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the options a config file resolves to.
    CheckConfig {
        /// Config file to inspect.
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("hedgehog error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Snapshot {
            transcript,
            config,
            mode,
            show_addresses,
            output,
        } => {
            let mut config = match config {
                Some(path) => HedgehogConfig::load_file(&path),
                None => HedgehogConfig::load(&std::env::current_dir()?),
            };
            if let Some(mode) = mode {
                config.graph.visualization_mode = mode;
            }
            if show_addresses {
                config.graph.show_memory_addresses = true;
            }
            snapshot(&transcript, &config, output.as_deref())
        }
        Command::CheckConfig { path } => {
            check_config(&path);
            Ok(())
        }
    }
}

fn snapshot(
    transcript: &Path,
    config: &HedgehogConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(transcript)
        .with_context(|| format!("failed to read transcript {}", transcript.display()))?;
    let recorded = Transcript::from_json(&text)
        .with_context(|| format!("invalid transcript {}", transcript.display()))?;
    let replay = ReplaySession::new(recorded);
    let session: &dyn DebugSession = &replay;
    let tracker = SnapshotTracker::new(StopGeneration::new());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let snapshot = runtime
        .block_on(take_snapshot(Some(session), &tracker, config))
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;
    info!(
        nodes = snapshot.node_count,
        truncated = snapshot.truncated,
        requests = replay.requests().len(),
        "snapshot of '{}' complete",
        snapshot.scope_name
    );
    if let Some(notice) = snapshot.truncation_notice() {
        warn!("{notice}");
    }

    match output {
        Some(path) => std::fs::write(path, snapshot.document.as_str())
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", snapshot.document.as_str()),
    }
    Ok(())
}

fn check_config(path: &Path) {
    let config = HedgehogConfig::load_file(path);
    let options = config.graph_options();
    println!("config: {}", path.display());
    println!("visualization_mode = {}", options.visualization_mode);
    println!("show_memory_addresses = {}", options.show_memory_addresses);
    println!("memory_read_size = {}", options.memory_read_size);
    println!("hide_internal_variables = {}", options.hide_internal_variables);
    println!("filter.preset = {:?}", config.preset);
    let names = config.policy.internal_names().collect::<Vec<_>>();
    println!("filter.internal_names = {names:?}");
}
