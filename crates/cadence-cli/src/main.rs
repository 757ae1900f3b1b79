mod cmd_dataset;
mod cmd_generate;
mod cmd_validate;

use anyhow::Context;
use cadence_core::{load_seed, SeedData};
use cadence_gen::{SimConfig, Velocity};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Synthetic AI-assisted commit and pull-request telemetry"
)]
struct Cli {
    /// Debug-level logging on stderr (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulation and write JSONL exports to a directory
    Generate {
        #[command(flatten)]
        run: RunArgs,
        /// Output directory (created if missing)
        #[arg(long, env = "CADENCE_OUT")]
        out: PathBuf,
    },
    /// Check a seed file and print a short summary
    Validate {
        /// Seed file (.json, .yaml or .yml)
        seed_file: PathBuf,
    },
    /// Run a simulation and print the research dataset as JSONL on stdout
    Dataset {
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Flags shared by every command that runs a simulation.
#[derive(Args, Debug, Clone)]
pub(crate) struct RunArgs {
    /// Seed file (.json, .yaml or .yml)
    #[arg(long, env = "CADENCE_SEED_FILE")]
    pub seed_file: PathBuf,
    /// Days of history ending at --now
    #[arg(long, default_value_t = 90, env = "CADENCE_DAYS")]
    pub days: u32,
    /// Velocity preset: low, medium or high
    #[arg(long, default_value = "medium", env = "CADENCE_VELOCITY")]
    pub velocity: String,
    /// RNG seed; omitted means wall-clock derived
    #[arg(long, env = "CADENCE_RNG_SEED")]
    pub rng_seed: Option<u64>,
    /// Global commit cap (0 = unbounded)
    #[arg(long, default_value_t = 0, env = "CADENCE_MAX_COMMITS")]
    pub max_commits: usize,
    /// End of the simulated window, RFC 3339 (default: current time)
    #[arg(long, env = "CADENCE_NOW")]
    pub now: Option<String>,
}

impl RunArgs {
    /// Load the seed file and map flags onto a run configuration.
    pub(crate) fn prepare(&self) -> anyhow::Result<(SeedData, SimConfig)> {
        let seed = load_seed(&self.seed_file)
            .with_context(|| format!("loading seed file {}", self.seed_file.display()))?;
        let now = match &self.now {
            Some(text) => OffsetDateTime::parse(text, &Rfc3339)
                .with_context(|| format!("invalid --now timestamp: {text}"))?,
            None => OffsetDateTime::now_utc(),
        };
        let config = SimConfig {
            days: self.days,
            seed: self.rng_seed,
            velocity: Velocity::from_name(&self.velocity),
            max_commits: self.max_commits,
            now,
        };
        Ok((seed, config))
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    match cli.cmd {
        Command::Generate { run, out } => cmd_generate::execute(&run, &out, &cancel),
        Command::Validate { seed_file } => cmd_validate::execute(&seed_file),
        Command::Dataset { run } => cmd_dataset::execute(&run, &cancel),
    }
}
