use crate::{EvalError, Metrics, ProgressSeries};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// File name patterns of simulator output, highest priority first
///
/// Each tier is a list of alternatives; a `*` prefix means "ends with".
pub const RESULT_PATTERNS: [&[&str]; 3] = [
    // compressed performance log
    &[
        "*_cache_perf.txt.lzma",
        "*_cache_perf.txt.xz",
        "*_cache_perf.txt.zst",
    ],
    // uncompressed performance log
    &["*_cache_perf.txt"],
    // generic results
    &["results.json"],
];

/// How a result file is decoded, chosen by its suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultEncoding {
    Plain,
    Xz,
    Zstd,
}

impl ResultEncoding {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" | "txt" => Some(ResultEncoding::Plain),
            "lzma" | "xz" => Some(ResultEncoding::Xz),
            "zst" => Some(ResultEncoding::Zstd),
            _ => None,
        }
    }
}

/// Decode a result file into its JSON document
pub fn load_result_file<P: AsRef<Path>>(path: P) -> Result<Value, EvalError> {
    let path = path.as_ref();
    let encoding = ResultEncoding::from_path(path).ok_or_else(|| EvalError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let read_error = |source: std::io::Error| EvalError::ResultRead {
        path: path.to_path_buf(),
        source,
    };
    let file = BufReader::new(File::open(path).map_err(read_error)?);

    let mut content = String::new();
    match encoding {
        ResultEncoding::Plain => {
            let mut reader = file;
            reader.read_to_string(&mut content).map_err(read_error)?;
        }
        ResultEncoding::Xz => {
            // python's lzma module writes .xz containers, older runs may be lzma-alone
            let stream = xz2::stream::Stream::new_auto_decoder(u64::MAX, 0)
                .map_err(|err| read_error(err.into()))?;
            let mut reader = xz2::read::XzDecoder::new_stream(file, stream);
            reader.read_to_string(&mut content).map_err(read_error)?;
        }
        ResultEncoding::Zstd => {
            let mut reader = zstd::stream::read::Decoder::with_buffer(file).map_err(read_error)?;
            reader.read_to_string(&mut content).map_err(read_error)?;
        }
    }

    serde_json::from_str(&content).map_err(|source| EvalError::ResultDecode {
        path: path.to_path_buf(),
        source,
    })
}

fn matches_pattern(file_name: &str, pattern: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => file_name.ends_with(suffix),
        None => file_name == pattern,
    }
}

/// Search `output_dir` recursively for a result file
///
/// Returns the first match of the highest-priority tier that matches at all.
pub fn find_result_file<P: AsRef<Path>>(output_dir: P) -> Option<PathBuf> {
    let output_dir = output_dir.as_ref();
    for tier in RESULT_PATTERNS {
        let found = WalkDir::new(output_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| tier.iter().any(|pattern| matches_pattern(name, pattern)))
            });
        if let Some(entry) = found {
            return Some(entry.into_path());
        }
    }
    None
}

/// One loaded simulation result
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub name: String,
    pub source: PathBuf,
    pub raw: Value,
    pub metrics: Metrics,
    pub progress: ProgressSeries,
}

impl SimulationResult {
    pub fn from_raw(name: String, source: PathBuf, raw: Value, interval_secs: u64) -> Self {
        let metrics = Metrics::extract(&raw);
        let progress = ProgressSeries::extract(&raw, interval_secs);
        Self {
            name,
            source,
            raw,
            metrics,
            progress,
        }
    }

    pub fn load(name: &str, path: &Path, interval_secs: u64) -> Result<Self, EvalError> {
        let raw = load_result_file(path)?;
        Ok(Self::from_raw(
            name.to_string(),
            path.to_path_buf(),
            raw,
            interval_secs,
        ))
    }
}
