use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default aggregation interval of the progress series, in seconds
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 600;
/// Operation label under which the simulator stores combined progress
pub const PROGRESS_OP_LABEL: &str = "GET+PUT";
pub const ELAPSED_COLUMN: &str = "Elapsed Trace Time";
pub const DAYS_COLUMN: &str = "Days";
pub const UTIL_COLUMN: &str = "Util";

const SECONDS_PER_DAY: f64 = 86400.0;

/// Flat metrics of one simulation; absent keys read as zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub write_rate_mbps: f64,
    pub iops_saved_ratio: f64,
    pub service_time_saved_ratio: f64,
    pub hit_rate_hz: f64,
    pub peak_service_time: f64,
    pub p99_service_time: f64,
    pub p50_service_time: f64,
    pub wasted_ratio: f64,
    pub evictions: f64,
    pub cache_size_gb: f64,
    pub ap_threshold: f64,
}

/// (column name, simulator key) for every metric, in column order
pub const METRIC_KEYS: [(&str, &str); 11] = [
    ("write_rate_mbps", "Write Rate (MB/s)"),
    ("iops_saved_ratio", "IOPS Saved Ratio"),
    ("service_time_saved_ratio", "Service Time Saved Ratio"),
    ("hit_rate_hz", "Hit Rate (Hz)"),
    ("peak_service_time", "PeakServiceTimeUsed1"),
    ("p99_service_time", "P99ServiceTimeUsed1"),
    ("p50_service_time", "P50ServiceTimeUsed1"),
    ("wasted_ratio", "Wasted"),
    ("evictions", "Evictions"),
    ("cache_size_gb", "Cache Size (GB)"),
    ("ap_threshold", "AP Threshold"),
];

impl Metrics {
    /// Project a decoded result document; never fails
    pub fn extract(raw: &Value) -> Self {
        let get = |key: &str| raw.get(key).and_then(as_number).unwrap_or(0.0);
        Self {
            write_rate_mbps: get("Write Rate (MB/s)"),
            iops_saved_ratio: get("IOPS Saved Ratio"),
            service_time_saved_ratio: get("Service Time Saved Ratio"),
            hit_rate_hz: get("Hit Rate (Hz)"),
            peak_service_time: get("PeakServiceTimeUsed1"),
            p99_service_time: get("P99ServiceTimeUsed1"),
            p50_service_time: get("P50ServiceTimeUsed1"),
            wasted_ratio: get("Wasted"),
            evictions: get("Evictions"),
            cache_size_gb: get("Cache Size (GB)"),
            ap_threshold: get("AP Threshold"),
        }
    }

    /// (column name, value) pairs in column order
    pub fn entries(&self) -> [(&'static str, f64); 11] {
        [
            (METRIC_KEYS[0].0, self.write_rate_mbps),
            (METRIC_KEYS[1].0, self.iops_saved_ratio),
            (METRIC_KEYS[2].0, self.service_time_saved_ratio),
            (METRIC_KEYS[3].0, self.hit_rate_hz),
            (METRIC_KEYS[4].0, self.peak_service_time),
            (METRIC_KEYS[5].0, self.p99_service_time),
            (METRIC_KEYS[6].0, self.p50_service_time),
            (METRIC_KEYS[7].0, self.wasted_ratio),
            (METRIC_KEYS[8].0, self.evictions),
            (METRIC_KEYS[9].0, self.cache_size_gb),
            (METRIC_KEYS[10].0, self.ap_threshold),
        ]
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}

/// Accept JSON numbers and numeric strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Columnar time series sampled during one simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSeries {
    columns: BTreeMap<String, Vec<f64>>,
    len: usize,
}

impl ProgressSeries {
    /// Read `progress["GET+PUT"]["<interval>"]`, empty if anything is missing
    pub fn extract(raw: &Value, interval_secs: u64) -> Self {
        let interval = interval_secs.to_string();
        let table = raw
            .get("progress")
            .and_then(|progress| progress.get(PROGRESS_OP_LABEL))
            .and_then(|by_interval| by_interval.get(interval.as_str()));

        let Some(table) = table else {
            return Self::default();
        };

        let mut series = match Self::from_table(table) {
            Some(series) => series,
            None => {
                log::warn!(
                    "Ignoring malformed progress series at interval {}s",
                    interval_secs
                );
                return Self::default();
            }
        };

        if let Some(elapsed) = series.columns.get(ELAPSED_COLUMN) {
            let days = elapsed.iter().map(|secs| secs / SECONDS_PER_DAY).collect();
            series.columns.insert(DAYS_COLUMN.to_string(), days);
        }
        series
    }

    /// Build from `{col: [..]}`, `{col: {row: ..}}` or `[{col: ..}, ..]`
    fn from_table(table: &Value) -> Option<Self> {
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        match table {
            Value::Object(by_column) => {
                for (name, cells) in by_column {
                    let values: Vec<f64> = match cells {
                        Value::Array(cells) => cells.iter().map(cell_value).collect(),
                        Value::Object(by_row) => {
                            // pandas to_dict() keys rows by their index
                            let mut rows: Vec<(f64, f64)> = by_row
                                .iter()
                                .map(|(row, cell)| {
                                    (row.parse().unwrap_or(f64::MAX), cell_value(cell))
                                })
                                .collect();
                            rows.sort_by(|left, right| left.0.total_cmp(&right.0));
                            rows.into_iter().map(|(_, value)| value).collect()
                        }
                        _ => return None,
                    };
                    columns.insert(name.clone(), values);
                }
            }
            Value::Array(rows) => {
                for (index, row) in rows.iter().enumerate() {
                    let row = row.as_object()?;
                    for (name, cell) in row {
                        let column = columns
                            .entry(name.clone())
                            .or_insert_with(|| vec![f64::NAN; index]);
                        column.push(cell_value(cell));
                    }
                    for column in columns.values_mut() {
                        column.resize(index + 1, f64::NAN);
                    }
                }
            }
            _ => return None,
        }

        // drop columns that hold no numbers at all, e.g. labels
        columns.retain(|_, values| values.iter().any(|value| !value.is_nan()));

        let mut lengths = columns.values().map(Vec::len);
        let len = lengths.next().unwrap_or(0);
        if lengths.any(|other| other != len) {
            return None;
        }
        Some(Self { columns, len })
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Elapsed days, present whenever the elapsed-time column is
    pub fn days(&self) -> Option<&[f64]> {
        self.column(DAYS_COLUMN)
    }

    /// Utilization against days, for the overlay figure
    pub fn utilization(&self) -> Option<(&[f64], &[f64])> {
        if self.is_empty() {
            return None;
        }
        Some((self.days()?, self.column(UTIL_COLUMN)?))
    }
}

fn cell_value(cell: &Value) -> f64 {
    as_number(cell).unwrap_or(f64::NAN)
}
