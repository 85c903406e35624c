use crate::{
    EvalError, Figure, FigureBackend, FigureWriter, Invocation, METRICS_HEATMAP, MarkdownReport,
    MatplotlibBackend, PERFORMANCE_COMPARISON, PROGRESS_UTILIZATION, PipelineConfig,
    ReportSink, SimulationResult, SimulationSpec, Skipped, SummaryTable,
    find_result_file, get_tqdm_style, metrics_heatmap, performance_comparison,
    progress_utilization, render_report, title_case,
};
use anyhow::Context;
use chrono::Local;
use indicatif::{HumanDuration, ProgressBar};
use log::{error, info, warn};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use walkdir::WalkDir;

pub const SUMMARY_FILE: &str = "summary.json";

/// How far a pipeline has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Configured,
    Running,
    Loaded,
    Analyzed,
    Rendered,
    Reported,
}

/// Runs simulations, collects their results and turns them into a summary,
/// figures and a report
///
/// Every stage can be called on its own. Failures of individual simulations
/// or result files are logged and kept in `skipped()`, they never abort the
/// remaining work.
pub struct Pipeline {
    config: PipelineConfig,
    /// in load order, at most one per name
    results: Vec<SimulationResult>,
    skipped: Vec<Skipped>,
    summary: Option<SummaryTable>,
    stage: Stage,
    backend: Box<dyn FigureBackend>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, EvalError> {
        Self::with_backend(config, Box::new(MatplotlibBackend))
    }

    pub fn with_backend(
        config: PipelineConfig,
        backend: Box<dyn FigureBackend>,
    ) -> Result<Self, EvalError> {
        config.validate()?;
        Ok(Self {
            config,
            results: vec![],
            skipped: vec![],
            summary: None,
            stage: Stage::Configured,
            backend,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        Self::new(PipelineConfig::load(path)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn results(&self) -> &[SimulationResult] {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&SimulationResult> {
        self.results.iter().find(|result| result.name == name)
    }

    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    pub fn summary(&self) -> Option<&SummaryTable> {
        self.summary.as_ref()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn record(&mut self, skipped: Skipped) {
        match &skipped {
            Skipped::MissingResult { .. } | Skipped::InsufficientData { .. } => {
                warn!("{}", skipped)
            }
            Skipped::SimulationRun { .. } | Skipped::ResultDecode { .. } => {
                error!("{}", skipped)
            }
        }
        // stages may be re-run, keep one record per cause
        if !self.skipped.contains(&skipped) {
            self.skipped.push(skipped);
        }
    }

    /// Run every configured simulation in order
    ///
    /// Returns (name, result file) for every simulation that succeeded and
    /// left a discoverable result.
    pub fn run_simulations(&mut self) -> Vec<(String, PathBuf)> {
        self.stage = Stage::Running;
        let specs = self.config.simulations.clone();
        info!("Starting {} simulations...", specs.len());

        let pbar = ProgressBar::new(specs.len() as u64);
        pbar.set_style(get_tqdm_style());

        let mut result_files = vec![];
        for spec in &specs {
            pbar.set_message(spec.name.clone());
            match self.run_simulation(spec, &pbar) {
                Ok(path) => result_files.push((spec.name.clone(), path)),
                Err(skipped) => pbar.suspend(|| self.record(skipped)),
            }
            pbar.inc(1);
        }
        pbar.finish_and_clear();

        info!(
            "{} of {} simulations produced results",
            result_files.len(),
            specs.len()
        );
        result_files
    }

    /// Log lines are written with the bar suspended so they do not tear it
    fn run_simulation(
        &self,
        spec: &SimulationSpec,
        pbar: &ProgressBar,
    ) -> Result<PathBuf, Skipped> {
        let name = spec.name.clone();
        let output_dir = self.config.simulation_output_dir(spec);

        if self.config.execution.skip_existing {
            if let Some(path) = find_result_file(&output_dir) {
                pbar.suspend(|| {
                    info!("Reusing existing result for '{}': {}", name, path.display())
                });
                return Ok(path);
            }
        }

        pbar.suspend(|| info!("Running simulation: {}", name));
        let failed = |reason: String| Skipped::SimulationRun {
            name: name.clone(),
            reason,
        };
        std::fs::create_dir_all(&output_dir).map_err(|err| {
            failed(format!("cannot create {}: {}", output_dir.display(), err))
        })?;

        // the simulator may run elsewhere, hand it paths that survive that
        let (trace_file, sim_output_dir) = match &self.config.simulator.working_dir {
            Some(_) => (
                std::path::absolute(&self.config.trace_file)
                    .unwrap_or_else(|_| self.config.trace_file.clone()),
                std::path::absolute(&output_dir).unwrap_or_else(|_| output_dir.clone()),
            ),
            None => (self.config.trace_file.clone(), output_dir.clone()),
        };

        let spec = spec.with_default_cache_size(self.config.cache_size_gb);
        let invocation = Invocation::new(
            &self.config.simulator.command,
            &spec,
            &trace_file,
            &sim_output_dir,
        );
        pbar.suspend(|| info!("Command: {}", invocation));

        let mut command = invocation.command();
        if let Some(working_dir) = &self.config.simulator.working_dir {
            command.current_dir(working_dir);
        }

        let start = Instant::now();
        let output = command
            .output()
            .map_err(|err| failed(format!("cannot launch {}: {}", invocation.program, err)))?;
        let elapsed = HumanDuration(start.elapsed());

        if !output.status.success() {
            pbar.suspend(|| {
                error!("stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
                error!("stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
            });
            return Err(failed(format!("{} after {}", output.status, elapsed)));
        }
        pbar.suspend(|| info!("Simulation '{}' completed in {}", name, elapsed));

        match find_result_file(&output_dir) {
            Some(path) => {
                let bytes = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
                pbar.suspend(|| {
                    info!(
                        "Result file: {} ({})",
                        path.display(),
                        size::Size::from_bytes(bytes)
                    )
                });
                Ok(path)
            }
            None => Err(Skipped::MissingResult { name, output_dir }),
        }
    }

    /// Find result files under the output root, one per subdirectory
    ///
    /// Subdirectories of configured simulations come first, in configuration
    /// order, labelled with the simulation name. Others follow by directory
    /// name, labelled with the title-cased directory name.
    pub fn discover_result_files(&self) -> Vec<(String, PathBuf)> {
        let base = &self.config.output_base_dir;
        if !base.is_dir() {
            warn!("Output directory does not exist: {}", base.display());
            return vec![];
        }

        let mut found: Vec<(usize, String, PathBuf)> = WalkDir::new(base)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                let dir_name = entry.file_name().to_string_lossy().to_string();
                let path = find_result_file(entry.path())?;
                let configured = self
                    .config
                    .simulations
                    .iter()
                    .position(|spec| spec.slug() == dir_name);
                Some(match configured {
                    Some(index) => (index, self.config.simulations[index].name.clone(), path),
                    None => (usize::MAX, title_case(&dir_name.replace('_', " ")), path),
                })
            })
            .collect();
        found.sort_by_key(|(rank, _, _)| *rank);

        info!(
            "Discovered {} result files under {}",
            found.len(),
            base.display()
        );
        found
            .into_iter()
            .map(|(_, name, path)| (name, path))
            .collect()
    }

    /// Load result files, discovering them when none are given
    ///
    /// A file that fails to load is skipped. Loading a name again replaces
    /// the earlier result in place.
    pub fn load_results(&mut self, result_files: Option<Vec<(String, PathBuf)>>) -> usize {
        let result_files = result_files.unwrap_or_else(|| self.discover_result_files());
        info!("Loading {} result files...", result_files.len());

        let mut loaded = 0;
        for (name, path) in result_files {
            info!("Loading results for '{}' from {}", name, path.display());
            let interval = self.config.analysis.progress_interval_secs;
            match SimulationResult::load(&name, &path, interval) {
                Ok(result) => {
                    match self.results.iter().position(|known| known.name == name) {
                        Some(index) => self.results[index] = result,
                        None => self.results.push(result),
                    }
                    loaded += 1;
                }
                Err(err) => self.record(Skipped::ResultDecode {
                    name,
                    reason: format!("{:#}", anyhow::Error::new(err)),
                }),
            }
        }
        self.summary = None;
        self.stage = Stage::Loaded;
        loaded
    }

    /// Build the summary table from everything loaded so far
    pub fn analyze_results(&mut self) -> &SummaryTable {
        info!("Analyzing results...");
        if self.results.is_empty() {
            error!("No results loaded. Run load_results() first.");
        }

        let mut table = SummaryTable::from_results(&self.results);
        if !table.is_empty() {
            if let Err(skipped) = table.add_baseline_improvements(&self.config.analysis.baseline) {
                self.record(skipped);
            }
        }

        if self.config.analysis.generate_comparison_tables {
            if let Err(err) = self.write_summary(&table) {
                error!("Failed to write summary: {:#}", err);
            }
        }

        info!("Analysis complete");
        self.stage = Stage::Analyzed;
        self.summary.insert(table)
    }

    fn write_summary(&self, table: &SummaryTable) -> anyhow::Result<()> {
        let dir = &self.config.figures.output_dir;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(SUMMARY_FILE);
        std::fs::write(&path, serde_json::to_vec_pretty(table)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Summary saved to {}", path.display());
        Ok(())
    }

    fn summary_or_analyze(&mut self) -> SummaryTable {
        if let Some(table) = &self.summary {
            return table.clone();
        }
        self.analyze_results().clone()
    }

    /// Render the three standard figures in every configured format
    ///
    /// Returns the files actually written.
    pub fn generate_figures(&mut self) -> Vec<PathBuf> {
        info!("Generating figures...");
        let table = self.summary_or_analyze();
        if table.is_empty() {
            self.record(Skipped::InsufficientData {
                stage: "figures",
                reason: "no results to plot".to_string(),
            });
            return vec![];
        }

        let mut saved = vec![];
        let mut skipped = vec![];
        {
            let writer = FigureWriter::new(&self.config.figures, self.backend.as_ref());
            let comparison = performance_comparison(&table, &self.config.analysis.metrics);
            saved.extend(writer.save(&comparison, PERFORMANCE_COMPARISON));

            if self.config.analysis.generate_progress_plots {
                let progress = progress_utilization(&self.results);
                saved.extend(writer.save(&progress, PROGRESS_UTILIZATION));
            }

            match metrics_heatmap(&table) {
                Ok(heatmap) => saved.extend(writer.save(&heatmap, METRICS_HEATMAP)),
                Err(reason) => skipped.push(reason),
            }
        }
        for reason in skipped {
            self.record(reason);
        }

        info!(
            "Saved {} figure files to {}",
            saved.len(),
            self.config.figures.output_dir.display()
        );
        self.stage = Stage::Rendered;
        saved
    }

    /// Save an extra figure next to the standard ones, through the same backend
    pub fn save_figure(&self, figure: &Figure, stem: &str) -> Vec<PathBuf> {
        FigureWriter::new(&self.config.figures, self.backend.as_ref()).save(figure, stem)
    }

    /// Write the report, by default to the configured report path
    ///
    /// The returned report is still open, so callers may append their own
    /// sections before finalizing it.
    pub fn generate_report(&mut self, output_path: Option<&Path>) -> Result<MarkdownReport, EvalError> {
        let path = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.report_path());
        let table = self.summary_or_analyze();

        let text = render_report(&self.config, &table, &path, Local::now());
        let mut report = MarkdownReport::create(&path)?;
        report.append(&text)?;
        info!("Report saved to {}", path.display());

        self.stage = Stage::Reported;
        Ok(report)
    }

    /// Run, load, analyze, render and report in one go
    pub fn run_full_pipeline(&mut self, skip_simulations: bool) -> anyhow::Result<SummaryTable> {
        info!("{}", "=".repeat(80));
        info!("Starting Integrated Evaluation Pipeline");
        info!("{}", "=".repeat(80));

        let result_files = if skip_simulations {
            None
        } else {
            Some(self.run_simulations())
        };
        self.load_results(result_files);
        let table = self.analyze_results().clone();
        self.generate_figures();

        let mut report = self
            .generate_report(None)
            .context("Failed to generate report")?;
        report.finalize()?;

        info!("{}", "=".repeat(80));
        info!("Pipeline Complete!");
        info!("{}", "=".repeat(80));
        if !self.skipped.is_empty() {
            warn!("{} items were skipped:", self.skipped.len());
            for skipped in &self.skipped {
                warn!("  {}", skipped);
            }
        }
        Ok(table)
    }
}

/// Write a shell stand-in for the simulator into `dir`
///
/// It understands `--eviction-policy` and `--output-dir`: `lru` and `dt-slru`
/// write a small result, anything else exits with status 3.
#[cfg(test)]
pub(crate) fn write_fake_simulator(dir: &Path) -> PathBuf {
    let path = dir.join("fake_simulator.sh");
    std::fs::write(
        &path,
        r#"all_args="$*"
out=""
policy=""
while [ $# -gt 0 ]; do
    case "$1" in
        --output-dir) out="$2"; shift 2 ;;
        --eviction-policy) policy="$2"; shift 2 ;;
        *) shift ;;
    esac
done
case "$policy" in
    lru) st=0.2; hit=10; peak=5 ;;
    dt-slru) st=0.25; hit=12; peak=4 ;;
    *) echo "unsupported policy: $policy" >&2; exit 3 ;;
esac
echo "simulating $policy"
mkdir -p "$out/run"
printf '{"Service Time Saved Ratio": %s, "Hit Rate (Hz)": %s, "PeakServiceTimeUsed1": %s, "args": "%s", "progress": {"GET+PUT": {"600": {"Elapsed Trace Time": [0, 43200, 86400], "Util": [0.4, 0.5, 0.6]}}}}' \
    "$st" "$hit" "$peak" "$all_args" > "$out/run/full_0_0.1_cache_perf.txt"
"#,
    )
    .unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HIT_IMPROVEMENT_COLUMN, ST_IMPROVEMENT_COLUMN, SimulationParams};
    use std::sync::{Arc, Mutex};

    /// Records every figure and touches the target file
    #[derive(Clone, Default)]
    struct RecordingBackend {
        saved: Arc<Mutex<Vec<(PathBuf, Figure)>>>,
    }

    impl FigureBackend for RecordingBackend {
        fn save(&self, figure: &Figure, path: &Path, _dpi: u32) -> anyhow::Result<()> {
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(path, b"")?;
            self.saved
                .lock()
                .unwrap()
                .push((path.to_path_buf(), figure.clone()));
            Ok(())
        }
    }

    struct FailingBackend;

    impl FigureBackend for FailingBackend {
        fn save(&self, _figure: &Figure, _path: &Path, _dpi: u32) -> anyhow::Result<()> {
            anyhow::bail!("no display")
        }
    }

    fn config(root: &Path, simulations: Vec<SimulationSpec>) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.trace_file = root.join("full_0_0.1.trace");
        config.output_base_dir = root.join("runs");
        config.figures.output_dir = root.join("figures");
        config.figures.formats = vec!["png".to_string()];
        config.simulator.command = vec![
            "sh".to_string(),
            super::write_fake_simulator(root).display().to_string(),
        ];
        config.simulations = simulations;
        config
    }

    fn baseline() -> SimulationSpec {
        SimulationSpec::new("Baseline", "lru").with_params(SimulationParams {
            admission_policy: Some("acceptall".into()),
            ..Default::default()
        })
    }

    fn dt_slru() -> SimulationSpec {
        SimulationSpec::new("DT-SLRU", "dt-slru").with_params(SimulationParams {
            dt_per_byte_score: Some(0.0051.into()),
            ..Default::default()
        })
    }

    #[test]
    #[cfg(unix)]
    fn test_baseline_comparison_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::default();
        let mut pipeline = Pipeline::with_backend(
            config(dir.path(), vec![baseline(), dt_slru()]),
            Box::new(backend.clone()),
        )
        .unwrap();

        let table = pipeline.run_full_pipeline(false).unwrap();
        assert_eq!(pipeline.stage(), Stage::Reported);
        assert!(pipeline.skipped().is_empty(), "{:?}", pipeline.skipped());

        assert_eq!(table.rows.len(), 2);
        assert!(table.has_column(ST_IMPROVEMENT_COLUMN));
        assert!(table.has_column(HIT_IMPROVEMENT_COLUMN));
        let expected = (0.25 - 0.2) / 0.2 * 100.0;
        let actual = table.row("DT-SLRU").unwrap().get(ST_IMPROVEMENT_COLUMN).unwrap();
        assert!((actual - expected).abs() < 1e-9);
        assert_eq!(table.row("Baseline").unwrap().get(ST_IMPROVEMENT_COLUMN), Some(0.0));

        // cache size is injected into every invocation
        let args = pipeline.result("DT-SLRU").unwrap().raw["args"].as_str().unwrap();
        assert!(args.contains("--eviction-policy dt-slru"));
        assert!(args.contains("--cache-size-gb 366.475"));
        assert!(args.contains("--dt-per-byte-score 0.0051"));

        let figures = dir.path().join("figures");
        let saved: Vec<PathBuf> = backend
            .saved
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect();
        assert_eq!(
            saved,
            vec![
                figures.join("performance_comparison.png"),
                figures.join("progress_utilization.png"),
                figures.join("metrics_heatmap.png"),
            ]
        );
        assert!(figures.join(SUMMARY_FILE).exists());

        let report = std::fs::read_to_string(figures.join("evaluation_report.md")).unwrap();
        assert!(report.contains("- **Best Service Time Saved:** DT-SLRU"));
        assert!(report.contains("- **Number of Simulations:** 2"));
        assert!(report.contains("![Metrics Heatmap](metrics_heatmap.png)"));
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_simulation_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let broken = SimulationSpec::new("Broken FIFO", "fifo");
        let mut pipeline = Pipeline::with_backend(
            config(dir.path(), vec![broken, baseline()]),
            Box::new(RecordingBackend::default()),
        )
        .unwrap();

        let result_files = pipeline.run_simulations();
        assert_eq!(result_files.len(), 1);
        assert_eq!(result_files[0].0, "Baseline");
        assert!(matches!(
            &pipeline.skipped()[0],
            Skipped::SimulationRun { name, reason } if name == "Broken FIFO" && reason.contains('3')
        ));

        assert_eq!(pipeline.load_results(Some(result_files)), 1);
        assert_eq!(pipeline.analyze_results().rows.len(), 1);
        assert_eq!(pipeline.generate_figures().len(), 3);
        let mut report = pipeline.generate_report(None).unwrap();
        report.section("Notes", "custom").unwrap();
        report.finalize().unwrap();
        let text = std::fs::read_to_string(pipeline.config().report_path()).unwrap();
        assert!(text.ends_with("## Notes\n\ncustom\n\n"));
    }

    #[test]
    #[cfg(unix)]
    fn test_skip_existing_reuses_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), vec![baseline()]);
        let mut pipeline = Pipeline::with_backend(
            config.clone(),
            Box::new(RecordingBackend::default()),
        )
        .unwrap();
        assert_eq!(pipeline.run_simulations().len(), 1);

        // a launcher that always fails proves nothing is re-run
        config.execution.skip_existing = true;
        config.simulator.command = vec!["false".to_string()];
        let mut pipeline =
            Pipeline::with_backend(config, Box::new(RecordingBackend::default())).unwrap();
        let files = pipeline.run_simulations();
        assert_eq!(files.len(), 1);
        assert!(pipeline.skipped().is_empty());
    }

    #[test]
    fn test_analyze_only_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs");
        let write = |sub: &str, file: &str, body: &str| {
            let path = runs.join(sub).join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        };
        // no "Hit Rate (Hz)" anywhere
        write(
            "dt-slru",
            "results.json",
            r#"{"Service Time Saved Ratio": 0.3, "PeakServiceTimeUsed1": 2}"#,
        );
        write(
            "baseline",
            "nested/full_cache_perf.txt",
            r#"{"Service Time Saved Ratio": 0.2, "PeakServiceTimeUsed1": 3}"#,
        );
        write("baseline", "results.json", "{}");
        write("old_ede_run", "results.json", r#"{"Hit Rate (Hz)": 7}"#);
        write("broken", "x_cache_perf.txt", "not json");
        std::fs::create_dir_all(runs.join("empty")).unwrap();

        let mut config = config(dir.path(), vec![baseline(), dt_slru()]);
        config.simulator.command = vec!["false".to_string()];
        let mut pipeline =
            Pipeline::with_backend(config, Box::new(RecordingBackend::default())).unwrap();

        let files = pipeline.discover_result_files();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Baseline", "DT-SLRU", "Broken", "Old Ede Run"]);
        assert_eq!(files[0].1, runs.join("baseline/nested/full_cache_perf.txt"));

        assert_eq!(pipeline.load_results(None), 3);
        assert_eq!(pipeline.result("DT-SLRU").unwrap().metrics.hit_rate_hz, 0.0);
        assert!(matches!(
            &pipeline.skipped()[0],
            Skipped::ResultDecode { name, .. } if name == "Broken"
        ));

        let table = pipeline.analyze_results().clone();
        assert_eq!(table.rows.len(), 3);
        // baseline hit rate is zero, so no relative columns
        assert!(!table.has_column(ST_IMPROVEMENT_COLUMN));
        assert!(
            pipeline
                .skipped()
                .iter()
                .any(|skipped| matches!(skipped, Skipped::InsufficientData { .. }))
        );

        // analyzing twice records the skip once
        let before = pipeline.skipped().len();
        pipeline.analyze_results();
        assert_eq!(pipeline.skipped().len(), before);
    }

    #[test]
    fn test_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::with_backend(
            config(dir.path(), vec![baseline()]),
            Box::new(RecordingBackend::default()),
        )
        .unwrap();
        assert!(pipeline.discover_result_files().is_empty());
        assert_eq!(pipeline.load_results(None), 0);
        assert!(pipeline.analyze_results().is_empty());
        assert!(pipeline.generate_figures().is_empty());

        let mut report = pipeline.generate_report(None).unwrap();
        report.finalize().unwrap();
        let text = std::fs::read_to_string(pipeline.config().report_path()).unwrap();
        assert!(text.contains("No simulation results were loaded."));
    }

    #[test]
    fn test_figure_failures_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(
            &path,
            r#"{"Service Time Saved Ratio": 0.3, "Hit Rate (Hz)": 5, "PeakServiceTimeUsed1": 2}"#,
        )
        .unwrap();
        let mut pipeline = Pipeline::with_backend(
            config(dir.path(), vec![baseline()]),
            Box::new(FailingBackend),
        )
        .unwrap();
        pipeline.load_results(Some(vec![("Baseline".to_string(), path)]));
        assert!(pipeline.generate_figures().is_empty());
        assert_eq!(pipeline.stage(), Stage::Rendered);
        pipeline.generate_report(None).unwrap();
        assert_eq!(pipeline.stage(), Stage::Reported);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Pipeline::with_backend(
            config(dir.path(), vec![baseline(), SimulationSpec::new("BASELINE", "fifo")]),
            Box::new(RecordingBackend::default()),
        );
        assert!(matches!(result, Err(EvalError::DuplicateSimulation { .. })));
    }
}
