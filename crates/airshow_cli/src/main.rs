//! Airshow CLI
//!
//! Headless sandbox runs of the airshow choreography and config presets.

use std::path::PathBuf;

use airshow_core::agent::PhysicalState;
use airshow_core::{AirshowChoreography, AirshowConfig, SandboxEnvironment, StepRunner, TickOutcome};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "airshow")]
#[command(about = "Run the formation choreography headlessly", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the choreography against the in-memory sandbox
    Run {
        /// Number of autonomous agents
        #[arg(long, default_value_t = 63)]
        agents: usize,

        /// Connect an observer at the origin
        #[arg(long, default_value = "false")]
        observer: bool,

        /// Simulated seconds to run
        #[arg(long, default_value_t = 60.0)]
        seconds: f32,

        /// Simulation step in seconds
        #[arg(long, default_value_t = 1.0 / 120.0)]
        dt: f32,

        /// Per-step positional jitter (0 disables)
        #[arg(long, default_value_t = 0.0)]
        jitter: f32,

        /// Jitter seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Config file (JSON or YAML); overrides --profile
        #[arg(long)]
        config: Option<PathBuf>,

        /// Preset name (default, relaxed, strict)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print a configuration preset
    Config {
        #[arg(long, default_value = "default")]
        profile: String,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    ticks: usize,
    seconds: f32,
    round_scores: Vec<i32>,
    overrides: usize,
    evaluation_faults: usize,
    generation_failures: usize,
    backoff_ticks: usize,
    missed_snapshots: usize,
    scored_frames: u32,
    current_score: i32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run { agents, observer, seconds, dt, jitter, seed, config, profile } => {
            let config = load_config(config, profile)?;
            config.validate().context("Invalid configuration")?;
            config.check_agent_count(agents)?;
            if dt <= 0.0 {
                bail!("--dt must be positive, got {dt}");
            }
            let summary = run(config, agents, observer, seconds, dt, jitter, seed);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Config { profile, format } => {
            let config = AirshowConfig::from_profile(&profile);
            let text = match format {
                Format::Json => serde_json::to_string_pretty(&config)?,
                Format::Yaml => serde_yaml::to_string(&config)?,
            };
            println!("{text}");
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, profile: Option<String>) -> Result<AirshowConfig> {
    match (path, profile) {
        (Some(path), _) => AirshowConfig::from_path(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        (None, Some(profile)) => Ok(AirshowConfig::from_profile(&profile)),
        (None, None) => Ok(AirshowConfig::from_env_or_default()),
    }
}

fn run(
    config: AirshowConfig,
    agents: usize,
    observer: bool,
    seconds: f32,
    dt: f32,
    jitter: f32,
    seed: u64,
) -> RunSummary {
    let mut env = SandboxEnvironment::new(agents).with_dt(dt);
    if jitter > 0.0 {
        env = env.with_jitter(seed, jitter);
    }
    if observer {
        env.add_observer(PhysicalState::default());
    }
    let mut runner = StepRunner::new(config, AirshowChoreography::default());

    let ticks = (seconds / dt).ceil() as usize;
    info!(agents, observer, ticks, "starting sandbox run");

    let mut summary = RunSummary { ticks, seconds, ..RunSummary::default() };
    for _ in 0..ticks {
        let report = runner.tick(&mut env);
        match report.outcome {
            TickOutcome::Advanced { .. } => summary.overrides += report.overrides,
            TickOutcome::EvaluationFault(_) => summary.evaluation_faults += 1,
            TickOutcome::GenerationFailed(_) => summary.generation_failures += 1,
            TickOutcome::BackingOff => summary.backoff_ticks += 1,
            TickOutcome::NoSnapshot => summary.missed_snapshots += 1,
        }
        if let Some(score) = report.round_score {
            info!(round = summary.round_scores.len() + 1, score, "round complete");
            summary.round_scores.push(score);
        }
        env.advance();
    }

    summary.scored_frames = runner.scorer().frames();
    summary.current_score = runner.scorer().score();
    summary
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
