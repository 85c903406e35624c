use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    /// Config file suffix is not one of json/yaml/yml/toml
    #[error("Unsupported config format: {}", path.display())]
    ConfigFormat { path: PathBuf },
    #[error("Failed to read config {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },
    #[error("Simulation name '{name}' is used more than once (output directory {slug})")]
    DuplicateSimulation { name: String, slug: String },
    #[error("Unsupported file format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("Failed to read result file {}", path.display())]
    ResultRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode result file {}", path.display())]
    ResultDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Report {} is already finalized", path.display())]
    ReportFinalized { path: PathBuf },
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something a pipeline stage skipped without aborting the batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Skipped {
    /// The simulator could not be launched or exited non-zero
    #[error("simulation '{name}' failed: {reason}")]
    SimulationRun { name: String, reason: String },
    /// The simulator succeeded but left no discoverable result
    #[error("no result file found for '{name}' in {}", output_dir.display())]
    MissingResult { name: String, output_dir: PathBuf },
    /// A result file could not be decoded
    #[error("failed to load '{name}': {reason}")]
    ResultDecode { name: String, reason: String },
    /// A stage had too little data to produce its output
    #[error("{stage}: {reason}")]
    InsufficientData { stage: &'static str, reason: String },
}

impl Skipped {
    /// Name of the simulation this skip belongs to, if any
    pub fn simulation(&self) -> Option<&str> {
        match self {
            Skipped::SimulationRun { name, .. }
            | Skipped::MissingResult { name, .. }
            | Skipped::ResultDecode { name, .. } => Some(name),
            Skipped::InsufficientData { .. } => None,
        }
    }
}
