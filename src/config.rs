use crate::{EvalError, SimulationParams, SimulationSpec};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Launcher for the external simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// program followed by leading arguments
    #[serde(default = "default_simulator_command")]
    pub command: Vec<String>,
    /// working directory of the simulator process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            command: default_simulator_command(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// summary columns shown in the bar comparison
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "default_true")]
    pub generate_progress_plots: bool,
    #[serde(default = "default_true")]
    pub generate_comparison_tables: bool,
    /// label of the row other rows are compared against
    #[serde(default = "default_baseline")]
    pub baseline: String,
    /// aggregation interval of the progress series, in seconds
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            generate_progress_plots: true,
            generate_comparison_tables: true,
            baseline: default_baseline(),
            progress_interval_secs: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiguresConfig {
    #[serde(default = "default_figures_dir")]
    pub output_dir: PathBuf,
    /// file extensions, one output file per figure and format
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl Default for FiguresConfig {
    fn default() -> Self {
        Self {
            output_dir: default_figures_dir(),
            formats: default_formats(),
            dpi: default_dpi(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// reuse results already present in a simulation's output directory
    #[serde(default)]
    pub skip_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// defaults to `evaluation_report.md` under the figures directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_report_title")]
    pub title: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: None,
            title: default_report_title(),
        }
    }
}

/// Everything one pipeline invocation needs, fixed before the first run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub trace_file: PathBuf,
    pub output_base_dir: PathBuf,
    #[serde(default = "default_cache_size_gb")]
    pub cache_size_gb: f64,
    pub simulations: Vec<SimulationSpec>,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub figures: FiguresConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

pub const DEFAULT_REPORT_NAME: &str = "evaluation_report.md";

fn default_simulator_command() -> Vec<String> {
    vec![
        "python3".to_string(),
        "BCacheSim/cachesim/simulate_ap.py".to_string(),
    ]
}

fn default_metrics() -> Vec<String> {
    vec![
        "service_time_saved_ratio".to_string(),
        "hit_rate_hz".to_string(),
        "peak_service_time".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_baseline() -> String {
    "Baseline".to_string()
}

fn default_progress_interval() -> u64 {
    crate::DEFAULT_PROGRESS_INTERVAL_SECS
}

fn default_figures_dir() -> PathBuf {
    PathBuf::from("figures/evaluation")
}

fn default_formats() -> Vec<String> {
    vec!["png".to_string(), "pdf".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_cache_size_gb() -> f64 {
    366.475
}

fn default_report_title() -> String {
    "BCacheSim Evaluation Report".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let acceptall = || SimulationParams {
            admission_policy: Some("acceptall".into()),
            ..Default::default()
        };
        Self {
            trace_file: PathBuf::from("data/traces/full_0_0.1.trace"),
            output_base_dir: PathBuf::from("runs/evaluation"),
            cache_size_gb: default_cache_size_gb(),
            simulations: vec![
                SimulationSpec::new("Baseline", "lru").with_params(acceptall()),
                SimulationSpec::new("DT-SLRU", "dt-slru").with_params(SimulationParams {
                    dt_per_byte_score: Some(0.0051.into()),
                    protected_cap: Some(0.3.into()),
                    ..acceptall()
                }),
                SimulationSpec::new("EDE", "ede").with_params(SimulationParams {
                    alpha_tti: Some(0.5.into()),
                    protected_cap: Some(0.3.into()),
                    ..acceptall()
                }),
            ],
            simulator: SimulatorConfig::default(),
            analysis: AnalysisConfig::default(),
            figures: FiguresConfig::default(),
            execution: ExecutionConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file, choosing the decoder by suffix
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        let parse_error = |message: String| EvalError::ConfigParse {
            path: path.to_path_buf(),
            message,
        };

        let read = || {
            std::fs::read_to_string(path).map_err(|source| EvalError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        };

        let config: PipelineConfig = match extension.as_deref() {
            Some("json") => {
                serde_json::from_str(&read()?).map_err(|err| parse_error(err.to_string()))?
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&read()?).map_err(|err| parse_error(err.to_string()))?
            }
            Some("toml") => toml::from_str(&read()?).map_err(|err| parse_error(err.to_string()))?,
            _ => {
                return Err(EvalError::ConfigFormat {
                    path: path.to_path_buf(),
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations whose simulations would share a name or an
    /// output directory
    pub fn validate(&self) -> Result<(), EvalError> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for spec in &self.simulations {
            let slug = spec.slug();
            if seen.insert(slug.clone(), &spec.name).is_some() {
                return Err(EvalError::DuplicateSimulation {
                    name: spec.name.clone(),
                    slug,
                });
            }
        }
        Ok(())
    }

    /// Output directory of one simulation
    pub fn simulation_output_dir(&self, spec: &SimulationSpec) -> PathBuf {
        self.output_base_dir.join(spec.slug())
    }

    pub fn report_path(&self) -> PathBuf {
        match &self.report.path {
            Some(path) => path.clone(),
            None => self.figures.output_dir.join(DEFAULT_REPORT_NAME),
        }
    }
}
