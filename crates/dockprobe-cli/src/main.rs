mod display;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dockprobe_core::{resolve_config, Pipeline, ProbeConfig, ProcessRunner, SystemClock};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dockprobe",
    version,
    about = "dockprobe - container image benchmark and security scanner",
    long_about = "Build or take a container image, measure how it builds, starts and runs, \
                  and scan it for vulnerable packages, embedded secrets and risky permissions."
)]
struct Cli {
    /// Log filter (error, warn, info, debug, trace or an EnvFilter directive)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure build time, startup time, memory, CPU, network and disk
    Bench(Target),

    /// Scan for vulnerabilities, secrets and permission issues
    Scan(Target),

    /// Benchmark and scan in one pass
    Run(Target),
}

#[derive(Args)]
struct Target {
    /// Existing image tag to probe (built from --context when omitted)
    #[arg(short, long)]
    image: Option<String>,

    /// Build context directory
    #[arg(short, long)]
    context: Option<PathBuf>,

    /// Path to a .dockprobe.toml config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Keep an image built by dockprobe instead of removing it
    #[arg(long)]
    keep_image: bool,
}

impl Target {
    /// Load config from disk, then let command-line flags win.
    fn config(&self) -> Result<ProbeConfig> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let mut config = resolve_config(self.config.as_deref(), &cwd)
            .context("Failed to load configuration")?;

        if let Some(context) = &self.context {
            config.pipeline.context_dir = context.clone();
        }
        if self.keep_image {
            config.pipeline.keep_image = true;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Bench(target) => cmd_bench(&target),
        Commands::Scan(target) => cmd_scan(&target),
        Commands::Run(target) => cmd_run(&target),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn cmd_bench(target: &Target) -> Result<()> {
    let config = target.config()?;
    let runner = ProcessRunner;
    let clock = SystemClock::new();
    let report = Pipeline::new(&runner, &clock, &config)
        .benchmark(target.image.as_deref())
        .context("Benchmark failed")?;

    match target.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => display::print_performance_report(&report),
    }
    Ok(())
}

fn cmd_scan(target: &Target) -> Result<()> {
    let config = target.config()?;
    let runner = ProcessRunner;
    let clock = SystemClock::new();
    let report = Pipeline::new(&runner, &clock, &config)
        .scan(target.image.as_deref())
        .context("Security scan failed")?;

    match target.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => display::print_scan_report(&report),
    }
    Ok(())
}

fn cmd_run(target: &Target) -> Result<()> {
    let config = target.config()?;
    let runner = ProcessRunner;
    let clock = SystemClock::new();
    let report = Pipeline::new(&runner, &clock, &config)
        .run(target.image.as_deref())
        .context("Pipeline failed")?;

    match target.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            display::print_performance_report(&report.performance);
            display::print_scan_report(&report.security);
        }
    }
    Ok(())
}
