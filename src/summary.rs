use crate::{Skipped, SimulationResult};
use cli_table::{Cell, Table, print_stdout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};

pub const POLICY_COLUMN: &str = "Policy";
pub const ST_IMPROVEMENT_COLUMN: &str = "st_improvement_vs_baseline";
pub const HIT_IMPROVEMENT_COLUMN: &str = "hit_improvement_vs_baseline";
/// Columns ending with this are deltas, not metrics
pub const RELATIVE_SUFFIX: &str = "_vs_baseline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Max,
    Min,
}

/// A "best performer" callout: which column, and which way is better
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub label: &'static str,
    pub column: &'static str,
    pub direction: Direction,
}

pub const KEY_FINDINGS: [Criterion; 3] = [
    Criterion {
        label: "Best Service Time Saved",
        column: "service_time_saved_ratio",
        direction: Direction::Max,
    },
    Criterion {
        label: "Best Hit Rate",
        column: "hit_rate_hz",
        direction: Direction::Max,
    },
    Criterion {
        label: "Lowest Peak Service Time",
        column: "peak_service_time",
        direction: Direction::Min,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub policy: String,
    pub values: BTreeMap<String, f64>,
}

impl SummaryRow {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }
}

/// One row per loaded simulation, one column per metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    /// metric columns in first-seen order, excluding `Policy`
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a SimulationResult>,
    {
        let mut table = SummaryTable::default();
        for result in results {
            let mut values = BTreeMap::new();
            for (column, value) in result.metrics.entries() {
                if !table.columns.iter().any(|known| known == column) {
                    table.columns.push(column.to_string());
                }
                values.insert(column.to_string(), value);
            }
            table.rows.push(SummaryRow {
                policy: result.name.clone(),
                values,
            });
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, policy: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.policy == policy)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|known| known == column)
    }

    pub fn column(&self, column: &str) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.get(column).unwrap_or(f64::NAN))
            .collect()
    }

    /// Add percentage deltas against the `baseline` row
    ///
    /// The columns are only added when the baseline row exists and both of its
    /// divisor metrics are non-zero; otherwise the table is left untouched.
    pub fn add_baseline_improvements(&mut self, baseline: &str) -> Result<(), Skipped> {
        let insufficient = |reason: String| Skipped::InsufficientData {
            stage: "baseline comparison",
            reason,
        };
        let row = self
            .row(baseline)
            .ok_or_else(|| insufficient(format!("no row labelled '{}'", baseline)))?;

        let pairs = [
            ("service_time_saved_ratio", ST_IMPROVEMENT_COLUMN),
            ("hit_rate_hz", HIT_IMPROVEMENT_COLUMN),
        ];
        let mut divisors = vec![];
        for (metric, _) in pairs {
            match row.get(metric) {
                Some(value) if value != 0.0 && value.is_finite() => divisors.push(value),
                _ => {
                    return Err(insufficient(format!(
                        "baseline '{}' has zero {}",
                        baseline, metric
                    )));
                }
            }
        }

        for ((metric, target), base) in pairs.into_iter().zip(divisors) {
            for row in &mut self.rows {
                let value = row.get(metric).unwrap_or(f64::NAN);
                row.values
                    .insert(target.to_string(), (value - base) / base * 100.0);
            }
            if !self.has_column(target) {
                self.columns.push(target.to_string());
            }
        }
        Ok(())
    }

    /// Arg-extremum of one column; ties go to the first row, NaN never wins
    pub fn best(&self, column: &str, direction: Direction) -> Option<&SummaryRow> {
        let mut best: Option<(&SummaryRow, f64)> = None;
        for row in &self.rows {
            let Some(value) = row.get(column).filter(|value| !value.is_nan()) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, current)) => match direction {
                    Direction::Max => value > current,
                    Direction::Min => value < current,
                },
            };
            if better {
                best = Some((row, value));
            }
        }
        best.map(|(row, _)| row)
    }

    /// Evaluate a criteria table, yielding (label, winning policy)
    pub fn key_findings<'a>(
        &'a self,
        criteria: &'a [Criterion],
    ) -> impl Iterator<Item = (&'static str, Option<&'a str>)> + 'a {
        criteria.iter().map(move |criterion| {
            (
                criterion.label,
                self.best(criterion.column, criterion.direction)
                    .map(|row| row.policy.as_str()),
            )
        })
    }

    /// Pipe table with a leading `Policy` column, metric columns right aligned
    pub fn to_markdown(&self) -> String {
        let mut builder = Builder::default();
        let mut header = vec![POLICY_COLUMN.to_string()];
        header.extend(self.columns.iter().cloned());
        builder.push_record(header);
        for row in &self.rows {
            let mut cells = vec![row.policy.clone()];
            cells.extend(
                self.columns
                    .iter()
                    .map(|column| row.get(column).map(format_value).unwrap_or_default()),
            );
            builder.push_record(cells);
        }

        let mut table = builder.build();
        table
            .with(Style::markdown())
            .modify(Columns::new(1..), Alignment::right());
        format!("{}\n", table)
    }

    /// Print to stdout as a console table
    pub fn print(&self) -> std::io::Result<()> {
        let mut table = vec![];
        for row in &self.rows {
            let mut cells = vec![row.policy.clone().cell()];
            for column in &self.columns {
                cells.push(
                    row.get(column)
                        .map(|value| format!("{:.4}", value))
                        .unwrap_or_default()
                        .cell(),
                );
            }
            table.push(cells);
        }
        let mut title = vec![POLICY_COLUMN.cell()];
        title.extend(self.columns.iter().map(|column| column.clone().cell()));
        print_stdout(table.table().title(title))
    }
}

/// Up to six significant digits, integers without a fraction
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let magnitude = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&magnitude) {
        return format!("{:.5e}", value);
    }
    let decimals = (5 - magnitude).max(0) as usize;
    let formatted = format!("{:.*}", decimals, value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
