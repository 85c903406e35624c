use crate::{FiguresConfig, RELATIVE_SUFFIX, SimulationResult, Skipped, SummaryTable};
use matplotlib::{Matplotlib, Mpl, Run, serde_json::Value};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const PERFORMANCE_COMPARISON: &str = "performance_comparison";
pub const PROGRESS_UTILIZATION: &str = "progress_utilization";
pub const METRICS_HEATMAP: &str = "metrics_heatmap";

/// One bar chart panel: a value per policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPanel {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Backend-independent description of a figure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figure {
    /// side-by-side bar charts
    Bars { panels: Vec<BarPanel> },
    /// several line series over a shared x axis
    Lines {
        title: String,
        xlabel: String,
        ylabel: String,
        series: Vec<LineSeries>,
        markers: bool,
    },
    /// `values[metric][policy]`, already normalized
    Heatmap {
        title: String,
        metrics: Vec<String>,
        policies: Vec<String>,
        values: Vec<Vec<f64>>,
        colorbar_label: String,
    },
}

/// Bar comparison of `metrics` across all summary rows
pub fn performance_comparison(table: &SummaryTable, metrics: &[String]) -> Figure {
    let labels: Vec<String> = table.rows.iter().map(|row| row.policy.clone()).collect();
    let panels = metrics
        .iter()
        .filter(|metric| table.has_column(metric))
        .map(|metric| BarPanel {
            title: metric_title(metric),
            labels: labels.clone(),
            values: table.column(metric),
        })
        .collect();
    Figure::Bars { panels }
}

/// Utilization over days for every result that carries both series
pub fn progress_utilization(results: &[SimulationResult]) -> Figure {
    let series = results
        .iter()
        .filter_map(|result| {
            let (days, util) = result.progress.utilization()?;
            Some(LineSeries {
                label: result.name.clone(),
                x: days.to_vec(),
                y: util.to_vec(),
            })
        })
        .collect();
    Figure::Lines {
        title: "Service Time Utilization Over Time".to_string(),
        xlabel: "Days".to_string(),
        ylabel: "Service Time Utilization".to_string(),
        series,
        markers: false,
    }
}

/// Min-max normalize every metric column to [0, 1]
///
/// Columns with zero range keep their raw values. Relative-improvement
/// columns are excluded.
pub fn normalized_metrics(table: &SummaryTable) -> Result<(Vec<String>, Vec<Vec<f64>>), Skipped> {
    let metrics: Vec<String> = table
        .columns
        .iter()
        .filter(|column| !column.ends_with(RELATIVE_SUFFIX))
        .cloned()
        .collect();
    if metrics.len() < 2 || table.is_empty() {
        return Err(Skipped::InsufficientData {
            stage: "heatmap",
            reason: format!(
                "{} metric columns over {} rows",
                metrics.len(),
                table.rows.len()
            ),
        });
    }

    let values = metrics
        .iter()
        .map(|metric| {
            let column = table.column(metric);
            let finite = column.iter().copied().filter(|value| !value.is_nan());
            let min = finite.clone().fold(f64::INFINITY, f64::min);
            let max = finite.fold(f64::NEG_INFINITY, f64::max);
            if max > min {
                column
                    .iter()
                    .map(|value| (value - min) / (max - min))
                    .collect()
            } else {
                column
            }
        })
        .collect();
    Ok((metrics, values))
}

pub fn metrics_heatmap(table: &SummaryTable) -> Result<Figure, Skipped> {
    let (metrics, values) = normalized_metrics(table)?;
    Ok(Figure::Heatmap {
        title: "Normalized Performance Metrics Heatmap".to_string(),
        metrics,
        policies: table.rows.iter().map(|row| row.policy.clone()).collect(),
        values,
        colorbar_label: "Normalized Score".to_string(),
    })
}

/// Human-readable axis label of a summary column
pub fn metric_title(metric: &str) -> String {
    match metric {
        "service_time_saved_ratio" => "Service Time Saved Ratio".to_string(),
        "hit_rate_hz" => "Hit Rate (Hz)".to_string(),
        "peak_service_time" => "Peak Service Time (ms)".to_string(),
        other => crate::title_case(&other.replace('_', " ")),
    }
}

/// Something that can turn a `Figure` into a file
pub trait FigureBackend {
    fn save(&self, figure: &Figure, path: &Path, dpi: u32) -> anyhow::Result<()>;
}

/// Writes one file per configured format for each figure
pub struct FigureWriter<'a> {
    config: &'a FiguresConfig,
    backend: &'a dyn FigureBackend,
}

impl<'a> FigureWriter<'a> {
    pub fn new(config: &'a FiguresConfig, backend: &'a dyn FigureBackend) -> Self {
        Self { config, backend }
    }

    pub fn paths(&self, stem: &str) -> Vec<PathBuf> {
        self.config
            .formats
            .iter()
            .map(|format| self.config.output_dir.join(format!("{}.{}", stem, format)))
            .collect()
    }

    /// Save in every format, logging and skipping the ones that fail
    pub fn save(&self, figure: &Figure, stem: &str) -> Vec<PathBuf> {
        let mut saved = vec![];
        for path in self.paths(stem) {
            match self.backend.save(figure, &path, self.config.dpi) {
                Ok(()) => {
                    log::info!("Saved figure: {}", path.display());
                    saved.push(path);
                }
                Err(err) => log::error!("Failed to save figure {}: {:#}", path.display(), err),
            }
        }
        saved
    }
}

/// Renders through matplotlib, driven by the `matplotlib` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct MatplotlibBackend;

impl FigureBackend for MatplotlibBackend {
    fn save(&self, figure: &Figure, path: &Path, dpi: u32) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mpl = Mpl::new()
            & Prelude { dpi }
            & FigureCommand {
                figure: figure.clone(),
            };
        mpl.run(Run::Save(path.to_path_buf()))
            .map_err(|err| anyhow::anyhow!("matplotlib failed on {}: {:?}", path.display(), err))?;
        if !path.exists() {
            anyhow::bail!("matplotlib did not produce {}", path.display());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Prelude {
    dpi: u32,
}

impl Matplotlib for Prelude {
    fn is_prelude(&self) -> bool {
        true
    }

    fn data(&self) -> Option<Value> {
        None
    }

    fn py_cmd(&self) -> String {
        format!(
            "\
import json
import matplotlib
matplotlib.use(\"Agg\")
import matplotlib.pyplot as plt
import numpy as np
plt.rcParams[\"savefig.dpi\"] = {}
plt.rcParams[\"savefig.bbox\"] = \"tight\"
",
            self.dpi
        )
    }
}

/// Draws a whole `Figure` and leaves it as the current `fig`/`ax`
#[derive(Clone, Debug, PartialEq)]
struct FigureCommand {
    figure: Figure,
}

/// Embed a JSON value as a python expression
fn py_json<T: Serialize>(value: &T) -> String {
    let value = serde_json::to_value(value).unwrap_or(Value::Null);
    format!("json.loads(r\"\"\" {} \"\"\")", value)
}

impl Matplotlib for FigureCommand {
    fn is_prelude(&self) -> bool {
        false
    }

    fn data(&self) -> Option<Value> {
        None
    }

    fn py_cmd(&self) -> String {
        match &self.figure {
            Figure::Bars { panels } => format!(
                "\
panels = {}
fig, axes = plt.subplots(1, max(len(panels), 1), figsize=(5 * max(len(panels), 1), 5), squeeze=False)
for ax, panel in zip(axes[0], panels):
    ax.bar(panel[\"labels\"], [np.nan if v is None else v for v in panel[\"values\"]], color=\"steelblue\")
    ax.set_title(panel[\"title\"])
    ax.set_xlabel(\"\")
    ax.set_ylabel(panel[\"title\"])
    ax.tick_params(axis=\"x\", rotation=45)
    ax.grid(True, alpha=0.3)
ax = axes[0][0]
fig.tight_layout()
",
                py_json(panels)
            ),
            Figure::Lines {
                title,
                xlabel,
                ylabel,
                series,
                markers,
            } => format!(
                "\
series = {}
fig, ax = plt.subplots(figsize=(12, 6))
for s in series:
    x = [np.nan if v is None else v for v in s[\"x\"]]
    y = [np.nan if v is None else v for v in s[\"y\"]]
    ax.plot(x, y, label=s[\"label\"], linewidth=2, marker={})
ax.set_xlabel({})
ax.set_ylabel({})
ax.set_title({})
if series:
    ax.legend()
ax.grid(True, alpha=0.3)
fig.tight_layout()
",
                py_json(series),
                if *markers { "\"x\"" } else { "None" },
                py_json(xlabel),
                py_json(ylabel),
                py_json(title),
            ),
            Figure::Heatmap {
                title,
                metrics,
                policies,
                values,
                colorbar_label,
            } => format!(
                "\
values = np.array([[np.nan if v is None else v for v in row] for row in {}], dtype=float)
metrics = {}
policies = {}
fig, ax = plt.subplots(figsize=(10, 6))
im = ax.imshow(values, cmap=\"YlGnBu\", aspect=\"auto\")
ax.set_xticks(range(len(policies)))
ax.set_xticklabels(policies)
ax.set_yticks(range(len(metrics)))
ax.set_yticklabels(metrics)
for i in range(values.shape[0]):
    for j in range(values.shape[1]):
        ax.text(j, i, f\"{{values[i, j]:.2f}}\", ha=\"center\", va=\"center\")
fig.colorbar(im, ax=ax, label={})
ax.set_title({})
fig.tight_layout()
",
                py_json(values),
                py_json(metrics),
                py_json(policies),
                py_json(colorbar_label),
                py_json(title),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HIT_IMPROVEMENT_COLUMN, ST_IMPROVEMENT_COLUMN, SummaryRow};
    use std::collections::BTreeMap;

    fn table(rows: &[(&str, &[(&str, f64)])]) -> SummaryTable {
        let mut table = SummaryTable::default();
        for (policy, values) in rows {
            let mut map = BTreeMap::new();
            for (column, value) in values.iter() {
                if !table.has_column(column) {
                    table.columns.push(column.to_string());
                }
                map.insert(column.to_string(), *value);
            }
            table.rows.push(SummaryRow {
                policy: policy.to_string(),
                values: map,
            });
        }
        table
    }

    #[test]
    fn test_normalization() {
        let table = table(&[
            ("A", &[("hit_rate_hz", 10.0), ("evictions", 5.0), (ST_IMPROVEMENT_COLUMN, 0.0)]),
            ("B", &[("hit_rate_hz", 20.0), ("evictions", 5.0), (ST_IMPROVEMENT_COLUMN, 10.0)]),
            ("C", &[("hit_rate_hz", 15.0), ("evictions", 5.0), (ST_IMPROVEMENT_COLUMN, 5.0)]),
        ]);
        let (metrics, values) = normalized_metrics(&table).unwrap();
        assert_eq!(metrics, vec!["hit_rate_hz", "evictions"]);
        assert_eq!(values[0], vec![0.0, 1.0, 0.5]);
        // zero range stays unscaled
        assert_eq!(values[1], vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_heatmap_needs_two_metrics() {
        let single = table(&[
            ("A", &[("hit_rate_hz", 10.0), (HIT_IMPROVEMENT_COLUMN, 0.0)]),
            ("B", &[("hit_rate_hz", 20.0), (HIT_IMPROVEMENT_COLUMN, 100.0)]),
        ]);
        assert!(matches!(
            metrics_heatmap(&single),
            Err(Skipped::InsufficientData { stage: "heatmap", .. })
        ));
        assert!(metrics_heatmap(&SummaryTable::default()).is_err());
    }

    #[test]
    fn test_heatmap_shape() {
        let table = table(&[
            ("A", &[("hit_rate_hz", 10.0), ("evictions", 1.0)]),
            ("B", &[("hit_rate_hz", 20.0), ("evictions", 3.0)]),
        ]);
        match metrics_heatmap(&table).unwrap() {
            Figure::Heatmap {
                metrics,
                policies,
                values,
                ..
            } => {
                assert_eq!(metrics.len(), 2);
                assert_eq!(policies, vec!["A", "B"]);
                assert_eq!(values, vec![vec![0.0, 1.0], vec![0.0, 1.0]]);
            }
            other => panic!("unexpected figure {:?}", other),
        }
    }

    #[test]
    fn test_performance_comparison() {
        let table = table(&[
            ("A", &[("hit_rate_hz", 10.0), ("peak_service_time", 3.0)]),
            ("B", &[("hit_rate_hz", 20.0), ("peak_service_time", 2.0)]),
        ]);
        let metrics = vec![
            "service_time_saved_ratio".to_string(),
            "hit_rate_hz".to_string(),
            "peak_service_time".to_string(),
        ];
        let Figure::Bars { panels } = performance_comparison(&table, &metrics) else {
            panic!("expected bars");
        };
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0].title, "Hit Rate (Hz)");
        assert_eq!(panels[1].values, vec![3.0, 2.0]);
        assert_eq!(panels[1].labels, vec!["A", "B"]);
    }

    #[test]
    fn test_writer_paths() {
        let config = FiguresConfig {
            output_dir: PathBuf::from("figures/x"),
            formats: vec!["png".to_string(), "pdf".to_string()],
            dpi: 100,
        };
        let backend = MatplotlibBackend;
        let writer = FigureWriter::new(&config, &backend);
        assert_eq!(
            writer.paths(METRICS_HEATMAP),
            vec![
                PathBuf::from("figures/x/metrics_heatmap.png"),
                PathBuf::from("figures/x/metrics_heatmap.pdf"),
            ]
        );
    }

    #[test]
    fn test_python_embedding() {
        let command = FigureCommand {
            figure: Figure::Lines {
                title: "Hit \"Rate\"".to_string(),
                xlabel: "x".to_string(),
                ylabel: "y".to_string(),
                series: vec![LineSeries {
                    label: "EDE".to_string(),
                    x: vec![0.0, 1.0],
                    y: vec![f64::NAN, 2.0],
                }],
                markers: true,
            },
        };
        let script = command.py_cmd();
        assert!(script.contains(r#"json.loads(r""" [{"label":"EDE","x":[0.0,1.0],"y":[null,2.0]}] """)"#));
        assert!(script.contains(r#"ax.set_title(json.loads(r""" "Hit \"Rate\"" """))"#));
        assert!(script.contains("marker=\"x\""));
    }
}
