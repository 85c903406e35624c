use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::Path, process::Command};

/// Eviction policy understood by the simulator
///
/// Anything outside the fixed set is kept verbatim in `Unknown` and produces no
/// `--eviction-policy` flag, so the simulator falls back to its own default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Policy {
    Lru,
    Fifo,
    Lirs,
    DtSlru,
    Ede,
    Ttl,
    Unknown(String),
}

impl Policy {
    pub const KNOWN: [Policy; 6] = [
        Policy::Lru,
        Policy::Fifo,
        Policy::Lirs,
        Policy::DtSlru,
        Policy::Ede,
        Policy::Ttl,
    ];

    /// Value for `--eviction-policy`, `None` for unrecognized policies
    pub fn flag_value(&self) -> Option<&'static str> {
        match self {
            Policy::Lru => Some("lru"),
            Policy::Fifo => Some("fifo"),
            Policy::Lirs => Some("lirs"),
            Policy::DtSlru => Some("dt-slru"),
            Policy::Ede => Some("ede"),
            Policy::Ttl => Some("ttl"),
            Policy::Unknown(_) => None,
        }
    }
}

impl From<String> for Policy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "lru" => Policy::Lru,
            "fifo" => Policy::Fifo,
            "lirs" => Policy::Lirs,
            "dt-slru" => Policy::DtSlru,
            "ede" => Policy::Ede,
            "ttl" => Policy::Ttl,
            _ => Policy::Unknown(value),
        }
    }
}

impl From<&str> for Policy {
    fn from(value: &str) -> Self {
        Policy::from(value.to_string())
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Unknown(name) => f.write_str(name),
            known => f.write_str(known.flag_value().unwrap_or_default()),
        }
    }
}

/// A parameter value that may be written as a number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{}", value),
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Policy- and admission-specific parameters of one simulation
///
/// Every key the simulator understands has a named field. Anything else lands
/// in `extra` and is never translated into a flag. Flag-only values accept any
/// scalar and are passed through as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// admission policy id, e.g. `acceptall`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_policy: Option<Scalar>,
    /// overrides the configuration-level cache size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size_gb: Option<f64>,
    /// DT-SLRU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt_per_byte_score: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected_cap: Option<Scalar>,
    /// EDE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_tti: Option<Scalar>,
    /// ML admission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_model: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ap_threshold: Option<Scalar>,
    /// prefetching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_when: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_range: Option<Scalar>,
    /// unrecognized keys, kept for reference only
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One named, parameterized simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSpec {
    pub name: String,
    pub policy: Policy,
    #[serde(flatten)]
    pub params: SimulationParams,
}

impl SimulationSpec {
    pub fn new<S: Into<String>, P: Into<Policy>>(name: S, policy: P) -> Self {
        Self {
            name: name.into(),
            policy: policy.into(),
            params: SimulationParams::default(),
        }
    }

    pub fn with_params(mut self, params: SimulationParams) -> Self {
        self.params = params;
        self
    }

    /// Name of the per-simulation output subdirectory
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Fill in the configuration-level cache size unless overridden
    pub fn with_default_cache_size(&self, cache_size_gb: f64) -> Self {
        let mut spec = self.clone();
        spec.params.cache_size_gb.get_or_insert(cache_size_gb);
        spec
    }

    /// Translate into simulator arguments, excluding the program itself
    pub fn to_cmd_args(&self, trace_file: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec!["--trace".to_string(), trace_file.display().to_string()];

        if let Some(policy) = self.policy.flag_value() {
            args.extend(["--eviction-policy".to_string(), policy.to_string()]);
        }

        let params = &self.params;
        let cache_size_gb = params.cache_size_gb.map(Scalar::Float);
        let flags = [
            ("--ap", &params.admission_policy),
            ("--cache-size-gb", &cache_size_gb),
            ("--dt-per-byte-score", &params.dt_per_byte_score),
            ("--protected-cap", &params.protected_cap),
            ("--alpha-tti", &params.alpha_tti),
            ("--ml-model", &params.ml_model),
            ("--ap-threshold", &params.ap_threshold),
            ("--prefetch-when", &params.prefetch_when),
            ("--prefetch-range", &params.prefetch_range),
        ];
        for (flag, value) in flags {
            if let Some(value) = value {
                args.extend([flag.to_string(), value.to_string()]);
            }
        }

        args.extend([
            "--output-dir".to_string(),
            output_dir.display().to_string(),
        ]);
        args
    }
}

/// A concrete simulator command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// `launcher` is the program followed by any leading arguments, e.g. the
    /// interpreter and the simulator script
    pub fn new(
        launcher: &[String],
        spec: &SimulationSpec,
        trace_file: &Path,
        output_dir: &Path,
    ) -> Self {
        let (program, leading) = match launcher.split_first() {
            Some((program, leading)) => (program.clone(), leading.to_vec()),
            None => (String::from("python3"), vec![]),
        };
        let mut args = leading;
        args.extend(spec.to_cmd_args(trace_file, output_dir));
        Self { program, args }
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dt_slru() -> SimulationSpec {
        SimulationSpec::new("DT-SLRU", "dt-slru").with_params(SimulationParams {
            admission_policy: Some("acceptall".into()),
            dt_per_byte_score: Some(0.0051.into()),
            protected_cap: Some(0.3.into()),
            ..Default::default()
        })
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|arg| arg == flag)
            .map(|index| args[index + 1].as_str())
    }

    #[test]
    fn test_eviction_flag_once_per_known_policy() {
        for policy in Policy::KNOWN {
            let spec = SimulationSpec::new("run", policy.clone());
            let args = spec.to_cmd_args(Path::new("t.trace"), Path::new("out"));
            let count = args.iter().filter(|arg| *arg == "--eviction-policy").count();
            assert_eq!(count, 1, "{:?}", policy);
            assert_eq!(flag_value(&args, "--eviction-policy"), policy.flag_value());
        }
    }

    #[test]
    fn test_unknown_policy_has_no_flag() {
        let spec = SimulationSpec::new("run", "belady");
        assert_eq!(spec.policy, Policy::Unknown("belady".to_string()));
        let args = spec.to_cmd_args(Path::new("t.trace"), Path::new("out"));
        assert!(!args.contains(&"--eviction-policy".to_string()));
        assert_eq!(
            args,
            vec!["--trace", "t.trace", "--output-dir", "out"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_known_params_translated() {
        let spec = dt_slru().with_default_cache_size(366.475);
        let args = spec.to_cmd_args(Path::new("full_0_0.1.trace"), Path::new("runs/dt-slru"));
        assert_eq!(
            args,
            vec![
                "--trace",
                "full_0_0.1.trace",
                "--eviction-policy",
                "dt-slru",
                "--ap",
                "acceptall",
                "--cache-size-gb",
                "366.475",
                "--dt-per-byte-score",
                "0.0051",
                "--protected-cap",
                "0.3",
                "--output-dir",
                "runs/dt-slru",
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let spec = dt_slru();
        let first = spec.to_cmd_args(Path::new("a"), Path::new("b"));
        for _ in 0..5 {
            assert_eq!(first, spec.to_cmd_args(Path::new("a"), Path::new("b")));
        }
    }

    #[test]
    fn test_all_params_translated_in_order() {
        let spec = SimulationSpec::new("ML", "lru").with_params(SimulationParams {
            admission_policy: Some("mlnew".into()),
            cache_size_gb: Some(400.0),
            dt_per_byte_score: Some(0.0051.into()),
            protected_cap: Some(0.3.into()),
            alpha_tti: Some(0.5.into()),
            ml_model: Some("models/ap.model".into()),
            ap_threshold: Some(3.5.into()),
            prefetch_when: Some("at_start".into()),
            prefetch_range: Some(Scalar::Text("episode".to_string())),
            ..Default::default()
        });
        let expected: Vec<String> = [
            "--trace",
            "t.trace",
            "--eviction-policy",
            "lru",
            "--ap",
            "mlnew",
            "--cache-size-gb",
            "400",
            "--dt-per-byte-score",
            "0.0051",
            "--protected-cap",
            "0.3",
            "--alpha-tti",
            "0.5",
            "--ml-model",
            "models/ap.model",
            "--ap-threshold",
            "3.5",
            "--prefetch-when",
            "at_start",
            "--prefetch-range",
            "episode",
            "--output-dir",
            "out",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let first = spec.to_cmd_args(Path::new("t.trace"), Path::new("out"));
        assert_eq!(first, expected);
        assert_eq!(spec.to_cmd_args(Path::new("t.trace"), Path::new("out")), first);
    }

    #[test]
    fn test_flag_values_accept_any_scalar() {
        let spec: SimulationSpec = serde_json::from_str(
            r#"{"name": "ML", "policy": "lru", "ap_threshold": "0.5", "ml_model": 7, "prefetch_when": true}"#,
        )
        .unwrap();
        assert_eq!(spec.params.ap_threshold, Some(Scalar::Text("0.5".to_string())));
        assert_eq!(spec.params.ml_model, Some(Scalar::Int(7)));

        let args = spec.to_cmd_args(Path::new("t"), Path::new("o"));
        assert_eq!(flag_value(&args, "--ap-threshold"), Some("0.5"));
        assert_eq!(flag_value(&args, "--ml-model"), Some("7"));
        assert_eq!(flag_value(&args, "--prefetch-when"), Some("true"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let spec: SimulationSpec = serde_json::from_str(
            r#"{"name": "EDE", "policy": "ede", "alpha_tti": 0.5, "alpah_tti": 0.7, "prefetch_range": 4}"#,
        )
        .unwrap();
        assert_eq!(spec.params.alpha_tti, Some(Scalar::Float(0.5)));
        assert_eq!(spec.params.prefetch_range, Some(Scalar::Int(4)));
        assert!(spec.params.extra.contains_key("alpah_tti"));

        let args = spec.to_cmd_args(Path::new("t"), Path::new("o"));
        assert_eq!(flag_value(&args, "--alpha-tti"), Some("0.5"));
        assert_eq!(flag_value(&args, "--prefetch-range"), Some("4"));
        assert!(!args.iter().any(|arg| arg.contains("alpah")));
    }

    #[test]
    fn test_override_cache_size() {
        let mut spec = dt_slru();
        spec.params.cache_size_gb = Some(100.0);
        let spec = spec.with_default_cache_size(366.475);
        assert_eq!(spec.params.cache_size_gb, Some(100.0));
    }

    #[test]
    fn test_invocation() {
        let launcher = vec!["python3".to_string(), "simulate_ap.py".to_string()];
        let invocation = Invocation::new(
            &launcher,
            &SimulationSpec::new("Baseline", "lru"),
            Path::new("t.trace"),
            &PathBuf::from("runs").join("baseline"),
        );
        assert_eq!(invocation.program, "python3");
        assert_eq!(invocation.args[0], "simulate_ap.py");
        assert_eq!(invocation.args[1], "--trace");
        assert_eq!(
            invocation.to_string(),
            "python3 simulate_ap.py --trace t.trace --eviction-policy lru --output-dir runs/baseline"
        );
    }

    #[test]
    fn test_slug() {
        assert_eq!(SimulationSpec::new("Baseline", "lru").slug(), "baseline");
        assert_eq!(SimulationSpec::new("EDE alpha 0.3", "ede").slug(), "ede_alpha_0.3");
    }
}
