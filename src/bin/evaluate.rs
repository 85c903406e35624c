//! Run simulations and turn their results into a summary, figures and a report
use anyhow::Context;
use bcachesim_eval::{Pipeline, PipelineConfig, ReportSink};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON, YAML or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run simulations, otherwise load existing results
    #[arg(long)]
    run_simulations: bool,

    /// Only load and analyze existing results
    #[arg(long)]
    analyze_only: bool,

    /// Generate figures in analyze-only mode
    #[arg(long)]
    generate_figures: bool,

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
    let print_table = config.analysis.generate_comparison_tables;
    let mut pipeline = Pipeline::new(config)?;

    if args.analyze_only {
        pipeline.load_results(None);
        pipeline.analyze_results();
        if args.generate_figures {
            pipeline.generate_figures();
        }
        pipeline.generate_report(None)?.finalize()?;
    } else {
        pipeline.run_full_pipeline(!args.run_simulations)?;
    }

    if print_table {
        if let Some(table) = pipeline.summary().filter(|table| !table.is_empty()) {
            table.print()?;
        }
    }
    if !pipeline.skipped().is_empty() {
        println!("{} items skipped, see log for details", pipeline.skipped().len());
        let mut simulations: Vec<&str> = pipeline
            .skipped()
            .iter()
            .filter_map(|skipped| skipped.simulation())
            .collect();
        simulations.dedup();
        if !simulations.is_empty() {
            println!("Simulations without results: {}", simulations.join(", "));
        }
    }
    Ok(())
}
