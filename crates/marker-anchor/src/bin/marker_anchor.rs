//! `marker-anchor` CLI: replay recorded detection scripts and manage configs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use marker_anchor::{run_replay, ReplayScript, TrackerConfig};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "marker-anchor")]
#[command(about = "Place persistent anchors from recorded marker detections")]
#[command(version)]
struct Cli {
    /// Log verbosity (off, error, warn, info, debug, trace). With the `tracing`
    /// feature this is the default filter and `RUST_LOG` overrides it.
    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    /// Emit structured JSON logs (requires the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a replay script and print or write the final anchor report.
    Replay {
        /// Path to the replay script (JSON).
        script: PathBuf,

        /// Tracker configuration (JSON). Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print or write the default tracker configuration.
    DefaultConfig {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse().map_err(|_| format!("unknown log level '{s}'"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Replay {
            script,
            config,
            output,
        } => run_replay_command(&script, config.as_deref(), output.as_deref()),
        Commands::DefaultConfig { output } => run_default_config(output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter, json: bool) {
    if let Err(err) = marker_anchor::core::init_tracing(json, level) {
        eprintln!("warning: tracing subscriber not installed: {err}");
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter, json: bool) {
    if json {
        eprintln!("warning: --log-json needs the `tracing` feature, using plain logs");
    }
    let _ = marker_anchor::core::init_with_level(level);
}

fn run_replay_command(
    script: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
) -> CliResult<()> {
    let config = match config {
        Some(path) => {
            log::info!("Loading config: {}", path.display());
            TrackerConfig::load_json(path)?
        }
        None => TrackerConfig::default(),
    };

    log::info!("Loading script: {}", script.display());
    let script = ReplayScript::load_json(script)?;
    let report = run_replay(&script, config)?;

    match output {
        Some(path) => {
            report.write_json(path)?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn run_default_config(output: Option<&Path>) -> CliResult<()> {
    let config = TrackerConfig::default();
    match output {
        Some(path) => {
            config.write_json(path)?;
            log::info!("Config written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
