use crate::{
    EvalError, KEY_FINDINGS, METRICS_HEATMAP, PERFORMANCE_COMPARISON, PROGRESS_UTILIZATION,
    PipelineConfig, SummaryTable,
};
use chrono::{DateTime, Local};
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// (alt text, file stem) of every figure the report links to
pub const FIGURE_LINKS: [(&str, &str); 3] = [
    ("Performance Comparison", PERFORMANCE_COMPARISON),
    ("Progress Utilization", PROGRESS_UTILIZATION),
    ("Metrics Heatmap", METRICS_HEATMAP),
];

/// Append-only text document
///
/// A sink stays open for appending until it is finalized. Appending to a
/// finalized sink is an error.
pub trait ReportSink {
    fn append(&mut self, text: &str) -> Result<(), EvalError>;
    fn finalize(&mut self) -> Result<(), EvalError>;
    fn is_finalized(&self) -> bool;

    /// Append a `##` section
    fn section(&mut self, heading: &str, body: &str) -> Result<(), EvalError> {
        self.append(&format!("## {}\n\n{}\n\n", heading, body.trim_end()))
    }
}

/// Markdown report on disk
pub struct MarkdownReport {
    path: PathBuf,
    // None once finalized
    writer: Option<BufWriter<File>>,
}

impl MarkdownReport {
    /// Start a new report, truncating any existing file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| EvalError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| EvalError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Continue an existing report; new text goes after what is already there
    pub fn reopen<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| EvalError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn io_error(&self, source: std::io::Error) -> EvalError {
        EvalError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ReportSink for MarkdownReport {
    fn append(&mut self, text: &str) -> Result<(), EvalError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(EvalError::ReportFinalized {
                path: self.path.clone(),
            });
        };
        // flush per append so the file is readable while still open
        let result = writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush());
        result.map_err(|source| self.io_error(source))
    }

    fn finalize(&mut self) -> Result<(), EvalError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| self.io_error(source))?;
        }
        Ok(())
    }

    fn is_finalized(&self) -> bool {
        self.writer.is_none()
    }
}

/// Path of a figure as written in the report, relative to the report's
/// directory when possible
pub fn figure_link(config: &PipelineConfig, report_path: &Path, stem: &str) -> String {
    let format = config
        .figures
        .formats
        .first()
        .map(String::as_str)
        .unwrap_or("png");
    let target = config.figures.output_dir.join(format!("{}.{}", stem, format));
    let base = report_path.parent().unwrap_or(Path::new(""));
    let link = pathdiff::diff_paths(&target, base).unwrap_or(target);
    // markdown links always use forward slashes
    link.to_string_lossy().replace('\\', "/")
}

/// Render the standard report body
pub fn render_report(
    config: &PipelineConfig,
    table: &SummaryTable,
    report_path: &Path,
    generated: DateTime<Local>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", config.report.title));
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        generated.format("%Y-%m-%d %H:%M:%S")
    ));

    out.push_str("## Configuration\n\n");
    out.push_str(&format!(
        "- **Trace File:** {}\n",
        config.trace_file.display()
    ));
    out.push_str(&format!("- **Cache Size:** {} GB\n", config.cache_size_gb));
    out.push_str(&format!(
        "- **Number of Simulations:** {}\n\n",
        config.simulations.len()
    ));

    out.push_str("## Results Summary\n\n");
    if table.is_empty() {
        out.push_str("No simulation results were loaded.\n\n");
    } else {
        out.push_str(&table.to_markdown());
        out.push('\n');
    }

    out.push_str("## Key Findings\n\n");
    if table.is_empty() {
        out.push_str("No findings without results.\n\n");
    } else {
        for (label, policy) in table.key_findings(&KEY_FINDINGS) {
            out.push_str(&format!("- **{}:** {}\n", label, policy.unwrap_or("n/a")));
        }
        out.push('\n');
    }

    out.push_str("## Figures\n\n");
    for (alt, stem) in FIGURE_LINKS {
        out.push_str(&format!(
            "![{}]({})\n\n",
            alt,
            figure_link(config, report_path, stem)
        ));
    }
    out
}
