use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use ppg_analyzer_lib::{
    AnalysisReport, AppConfig, FileSignalSource, JsonFileModelStore, Metric, ModelStore,
    Orchestrator, SyntheticPulseConfig, SyntheticPulseSource,
};

/// Fingertip PPG analysis with traditional estimates and online-trained models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.ppganalyzer/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for persisted model state
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Initialize missing models instead of failing
    #[arg(long, global = true)]
    fresh_models: bool,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one recorded capture (one sample per line or CSV)
    Analyze {
        /// Capture file
        #[arg(short, long)]
        input: PathBuf,

        /// Capture frame rate in Hz (defaults to the configured rate)
        #[arg(long)]
        sample_rate: Option<f64>,
    },

    /// Run synthetic captures through the pipeline
    Simulate {
        /// Number of captures
        #[arg(short = 'n', long, default_value = "1")]
        runs: usize,

        /// Simulated pulse rate
        #[arg(long, default_value = "72")]
        heart_rate_bpm: f64,

        /// Simulated breathing rate (omit for none)
        #[arg(long)]
        resp_rate_bpm: Option<f64>,

        /// Peak uniform noise amplitude
        #[arg(long, default_value = "0.0")]
        noise: f64,

        /// RNG seed for the noise
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Summarize stored model state
    Models,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => AppConfig::default_config_path()?,
    };
    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if args.fresh_models {
        config.pipeline.create_missing_models = true;
    }

    let model_dir = match &args.model_dir {
        Some(dir) => dir.clone(),
        None => config.get_model_dir()?,
    };

    info!("PPG analyzer starting...");
    info!("Config: {:?}", config_path);
    info!("Model directory: {:?}", model_dir);

    let store = JsonFileModelStore::new(&model_dir);

    match args.command {
        Command::Analyze { input, sample_rate } => {
            let rate = sample_rate.unwrap_or(config.pipeline.sample_rate_hz);
            let orchestrator = Orchestrator::new(config.pipeline, store)?;
            let mut source = FileSignalSource::new(&input, rate);

            let report = orchestrator
                .run_from(&mut source)
                .with_context(|| format!("Analysis of {:?} failed", input))?;
            print_report(&report, args.json)?;
        }

        Command::Simulate {
            runs,
            heart_rate_bpm,
            resp_rate_bpm,
            noise,
            seed,
        } => {
            let synthetic = SyntheticPulseConfig {
                sample_rate: config.pipeline.sample_rate_hz,
                duration_secs: config.pipeline.duration_secs,
                heart_rate_bpm,
                resp_rate_bpm,
                noise,
                seed,
                ..Default::default()
            };
            let orchestrator = Orchestrator::new(config.pipeline, store)?;
            let mut source = SyntheticPulseSource::new(synthetic);

            let mut failures = 0;
            for run in 1..=runs {
                match orchestrator.run_from(&mut source) {
                    Ok(report) => {
                        if !args.json {
                            println!("\n--- Run {}/{} ---", run, runs);
                        }
                        print_report(&report, args.json)?;
                    }
                    Err(e) => {
                        error!("Run {} failed: {}", run, e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} of {} simulated runs failed", failures, runs);
            }
        }

        Command::Models => list_models(&store)?,
    }

    info!("Done");
    Ok(())
}

fn print_report(report: &AnalysisReport, json: bool) -> Result<()> {
    if json {
        let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", content);
    } else {
        print!("{}", report.to_text());
    }

    let drifting = report.drifting_metrics();
    if !drifting.is_empty() {
        warn!("Drift detected for: {:?}", drifting);
    }
    Ok(())
}

fn list_models(store: &JsonFileModelStore) -> Result<()> {
    println!("Models in {:?}:\n", store.dir());

    for metric in Metric::ALL {
        match store.load(metric) {
            Ok(Some(state)) => {
                println!(
                    "  - {:<11} {} updates, {} samples seen, intercept {:.3}",
                    metric.key(),
                    state.updates,
                    state.regressor.t as u64 - 1,
                    state.regressor.intercept
                );
            }
            Ok(None) => println!("  - {:<11} (not trained)", metric.key()),
            Err(e) => println!("  - {:<11} error: {}", metric.key(), e),
        }
    }

    let history = store
        .load_drift_history()
        .context("Failed to read drift history")?
        .unwrap_or_default();
    println!();
    for metric in Metric::ALL {
        let values = history.entries.get(&metric).map(Vec::as_slice).unwrap_or(&[]);
        match values.last() {
            Some(last) => println!(
                "  {:<11} {} runs recorded, last validation MSE {:.4}",
                metric.key(),
                values.len(),
                last
            ),
            None => println!("  {:<11} no runs recorded", metric.key()),
        }
    }
    Ok(())
}
