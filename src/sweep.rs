use crate::{
    Figure, LineSeries, METRIC_KEYS, MarkdownReport, Pipeline, PipelineConfig, ReportSink,
    Scalar, SimulationResult, SimulationSpec, Skipped, figure_link, metric_title,
};
use anyhow::Context;
use std::{fmt, path::PathBuf, str::FromStr};

/// A numeric simulation parameter that can be swept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepParameter {
    DtPerByteScore,
    ProtectedCap,
    AlphaTti,
    ApThreshold,
    CacheSizeGb,
}

impl SweepParameter {
    pub const ALL: [SweepParameter; 5] = [
        SweepParameter::DtPerByteScore,
        SweepParameter::ProtectedCap,
        SweepParameter::AlphaTti,
        SweepParameter::ApThreshold,
        SweepParameter::CacheSizeGb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepParameter::DtPerByteScore => "dt_per_byte_score",
            SweepParameter::ProtectedCap => "protected_cap",
            SweepParameter::AlphaTti => "alpha_tti",
            SweepParameter::ApThreshold => "ap_threshold",
            SweepParameter::CacheSizeGb => "cache_size_gb",
        }
    }

    /// Copy of `spec` with this parameter set to `value`
    pub fn apply(&self, spec: &SimulationSpec, value: f64) -> SimulationSpec {
        let mut spec = spec.clone();
        let params = &mut spec.params;
        let field = match self {
            SweepParameter::DtPerByteScore => &mut params.dt_per_byte_score,
            SweepParameter::ProtectedCap => &mut params.protected_cap,
            SweepParameter::AlphaTti => &mut params.alpha_tti,
            SweepParameter::ApThreshold => &mut params.ap_threshold,
            SweepParameter::CacheSizeGb => {
                params.cache_size_gb = Some(value);
                return spec;
            }
        };
        *field = Some(Scalar::Float(value));
        spec
    }
}

impl fmt::Display for SweepParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepParameter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|parameter| parameter.as_str() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown sweep parameter {}, expected one of {}",
                    s,
                    Self::ALL.map(|parameter| parameter.as_str()).join(", ")
                )
            })
    }
}

/// One parameter of one base simulation, varied over a list of values
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub base: SimulationSpec,
    pub parameter: SweepParameter,
    pub values: Vec<f64>,
    /// summary column plotted against the parameter
    pub metric: String,
}

impl SweepConfig {
    pub fn new(
        base: SimulationSpec,
        parameter: SweepParameter,
        values: Vec<f64>,
        metric: &str,
    ) -> anyhow::Result<Self> {
        if values.is_empty() {
            anyhow::bail!("Sweep over {} needs at least one value", parameter);
        }
        if !METRIC_KEYS.iter().any(|(column, _)| *column == metric) {
            anyhow::bail!("Unknown metric {}", metric);
        }
        Ok(Self {
            base,
            parameter,
            values,
            metric: metric.to_string(),
        })
    }

    pub fn spec_name(&self, value: f64) -> String {
        format!("{}_{}", self.base.name, value)
    }

    /// One specification per value, named `<base>_<value>`
    pub fn expand(&self) -> Vec<SimulationSpec> {
        self.values
            .iter()
            .map(|value| {
                let mut spec = self.parameter.apply(&self.base, *value);
                spec.name = self.spec_name(*value);
                spec
            })
            .collect()
    }

    /// Pipeline configuration running only the sweep, reusing earlier runs
    pub fn pipeline_config(&self, config: &PipelineConfig) -> PipelineConfig {
        let mut config = config.clone();
        config.simulations = self.expand();
        config.execution.skip_existing = true;
        config
    }

    pub fn figure_stem(&self) -> String {
        format!("sweep_{}", self.parameter)
    }

    /// Metric against parameter value, over whichever runs have results
    pub fn figure(&self, results: &[SimulationResult]) -> Result<Figure, Skipped> {
        let mut points: Vec<(f64, f64)> = self
            .values
            .iter()
            .filter_map(|value| {
                let name = self.spec_name(*value);
                let result = results.iter().find(|result| result.name == name)?;
                Some((*value, result.metrics.get(&self.metric)?))
            })
            .collect();
        if points.is_empty() {
            return Err(Skipped::InsufficientData {
                stage: "sweep figure",
                reason: format!("no results for any {} value", self.parameter),
            });
        }
        points.sort_by(|left, right| left.0.total_cmp(&right.0));

        let ylabel = metric_title(&self.metric);
        Ok(Figure::Lines {
            title: format!("{} vs. {}", ylabel, self.parameter),
            xlabel: self.parameter.to_string(),
            ylabel,
            series: vec![LineSeries {
                label: self.base.name.clone(),
                x: points.iter().map(|(x, _)| *x).collect(),
                y: points.iter().map(|(_, y)| *y).collect(),
            }],
            markers: true,
        })
    }
}

/// Run a sweep end to end and add its figure to the report
///
/// Returns the sweep figure files that were written.
pub fn run_sweep(pipeline: &mut Pipeline, sweep: &SweepConfig) -> anyhow::Result<Vec<PathBuf>> {
    pipeline.run_full_pipeline(false)?;

    let figure = match sweep.figure(pipeline.results()) {
        Ok(figure) => figure,
        Err(skipped) => {
            log::warn!("{}", skipped);
            return Ok(vec![]);
        }
    };
    let stem = sweep.figure_stem();
    let saved = pipeline.save_figure(&figure, &stem);

    let report_path = pipeline.config().report_path();
    let mut report = MarkdownReport::reopen(&report_path)
        .with_context(|| format!("Failed to reopen {}", report_path.display()))?;
    report.section(
        "Parameter Sweep",
        &format!(
            "- **Base:** {} ({})\n- **Parameter:** {}\n- **Values:** {}\n\n![Sweep]({})",
            sweep.base.name,
            sweep.base.policy,
            sweep.parameter,
            sweep
                .values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            figure_link(pipeline.config(), &report_path, &stem)
        ),
    )?;
    report.finalize()?;
    Ok(saved)
}
