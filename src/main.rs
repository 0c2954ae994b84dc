use anyhow::Context;
use biovalidate::{
    harness::{Action, Verdict},
    utils::{
        config::{HarnessConfig, Overrides},
        logging,
    },
    Harness,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Runs a biometric algorithm implementation over a validation dataset.
#[derive(Debug, Parser)]
#[command(name = "biovalidate", version, about)]
struct Cli {
    /// quality, detect-morph, detect-morph-diff, compare, enroll, finalize or search
    action: Action,

    /// Read-only directory handed to the implementation at initialization
    #[arg(short = 'c', long)]
    config_dir: Option<PathBuf>,

    /// Directory for shard files, logs and the enrollment database
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Base name of shard files and logs (defaults to the action name)
    #[arg(short = 's', long)]
    stem: Option<String>,

    /// Work item list; deleted once partitioned
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Number of worker processes
    #[arg(short = 't', long = "workers")]
    workers: Option<usize>,

    /// Shared library exporting `_create_plugin`
    #[arg(long, conflicts_with = "implementation")]
    library: Option<PathBuf>,

    /// Name of a built-in implementation
    #[arg(long)]
    implementation: Option<String>,

    /// face, iris or multimodal
    #[arg(long)]
    modality: Option<String>,

    /// Candidates per search
    #[arg(long)]
    top_k: Option<u32>,

    /// consolidated or unconsolidated
    #[arg(long)]
    gallery_type: Option<String>,

    /// Directory where the implementation keeps finalized enrollment data
    #[arg(long)]
    enrollment_dir: Option<PathBuf>,

    /// Extra forks allowed for a worker killed by a signal
    #[arg(long)]
    crash_retries: Option<u32>,

    /// Concatenate shard logs into one file after reconciliation
    #[arg(long)]
    merge_logs: bool,

    /// Harness settings file
    #[arg(long = "config", env = "BIOVALIDATE_CONFIG")]
    config_file: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_dir: self.config_dir.clone(),
            output_dir: self.output_dir.clone(),
            stem: self.stem.clone(),
            input: self.input.clone(),
            workers: self.workers,
            modality: self.modality.clone(),
            top_k: self.top_k,
            implementation: self.implementation.clone(),
            library: self.library.clone(),
            gallery_type: self.gallery_type.clone(),
            enrollment_dir: self.enrollment_dir.clone(),
            crash_retries: self.crash_retries,
            merge_logs: self.merge_logs.then_some(true),
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<Verdict> {
    let config = HarnessConfig::load(cli.config_file.as_deref(), &cli.overrides())
        .context("Failed to load configuration")?;
    logging::init(&config.logging).context("Failed to initialize logging")?;

    info!("Starting biovalidate v{}", env!("CARGO_PKG_VERSION"));
    let harness = Harness::new(config, cli.action)
        .with_context(|| format!("Failed to prepare the {} action", cli.action))?;
    let outcome = harness
        .run()
        .with_context(|| format!("The {} action failed", cli.action))?;
    Ok(outcome.verdict)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(verdict) => ExitCode::from(verdict.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("biovalidate: {:#}", e);
            ExitCode::from(Verdict::Failure.exit_code())
        }
    }
}
