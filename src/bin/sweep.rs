//! Sweep one parameter of a configured simulation and plot a metric against it
use anyhow::Context;
use bcachesim_eval::{Pipeline, PipelineConfig, SweepConfig, SweepParameter, run_sweep};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON, YAML or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the configured simulation to vary
    #[arg(short, long)]
    base: String,

    /// Parameter to vary, e.g. alpha_tti or dt_per_byte_score
    #[arg(short, long)]
    parameter: SweepParameter,

    /// Parameter values
    #[arg(short, long, value_delimiter = ',', required = true)]
    values: Vec<f64>,

    /// Summary column to plot
    #[arg(short, long, default_value = "peak_service_time")]
    metric: String,

    /// Override the simulation output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(output_dir) = args.output_dir {
        config.output_base_dir = output_dir;
    }

    let base = config
        .simulations
        .iter()
        .find(|spec| spec.name == args.base)
        .cloned()
        .with_context(|| format!("No simulation named {} in configuration", args.base))?;
    let sweep = SweepConfig::new(base, args.parameter, args.values, &args.metric)?;

    let mut pipeline = Pipeline::new(sweep.pipeline_config(&config))?;
    let saved = run_sweep(&mut pipeline, &sweep)?;

    if let Some(table) = pipeline.summary().filter(|table| !table.is_empty()) {
        table.print()?;
    }
    for path in saved {
        println!("Sweep figure written to {}", path.display());
    }
    Ok(())
}
