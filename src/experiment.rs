//! Experiment runs: batch files in, reports and persisted buckets out.
//!
//! Batch files are laid out as `<base>/<protocol>/<experiment>/<run>/*.json`,
//! with runs numbered from 1. Each run produces one report block and a
//! bucket file at `<output>/<protocol>/<experiment>/<run>.json`; after the
//! last run an aggregate block covers every run of the protocol.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::trace::{
    Classifier, DurationBuckets, IngestSummary, LatencyReport, Protocol, Sample, TraceSet,
    analyze, render,
};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a run bucket file", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk form of a run's buckets: microsecond values, with unmeasurable
/// requests stored as `ceiling + 1`.
///
/// The file does not say which protocol produced it, so reading it back
/// needs the protocol: only async runs hold unmeasurable requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedBuckets {
    #[serde(rename = "SUCCESS", default)]
    pub success: Vec<u64>,
    #[serde(rename = "FAILURE", default)]
    pub failure: Vec<u64>,
}

impl PersistedBuckets {
    pub fn from_buckets(buckets: &DurationBuckets, ceiling: u64) -> Self {
        let flatten = |samples: &[Sample]| samples.iter().map(|s| s.to_micros(ceiling)).collect();
        Self {
            success: flatten(&buckets.success),
            failure: flatten(&buckets.failure),
        }
    }

    pub fn into_buckets(self, protocol: Protocol, ceiling: u64) -> DurationBuckets {
        let failure = if protocol.is_async() {
            self.failure
                .into_iter()
                .map(|micros| Sample::from_failure_micros(micros, ceiling))
                .collect()
        } else {
            self.failure.into_iter().map(Sample::Measured).collect()
        };
        DurationBuckets {
            success: self.success.into_iter().map(Sample::Measured).collect(),
            failure,
        }
    }
}

/// Write a run's buckets (atomic write via temp file + rename).
pub fn write_run_file(
    path: &Path,
    buckets: &DurationBuckets,
    ceiling: u64,
) -> Result<(), PersistError> {
    let write_err = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_string(&PersistedBuckets::from_buckets(buckets, ceiling))
        .map_err(|e| write_err(e.into()))?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, json).map_err(write_err)?;

    #[cfg(windows)]
    let _ = std::fs::remove_file(path);

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(write_err(e));
    }
    log::debug!("Wrote {} ({} requests)", path.display(), buckets.total());
    Ok(())
}

pub fn load_run_file(
    path: &Path,
    protocol: Protocol,
    ceiling: u64,
) -> Result<DurationBuckets, PersistError> {
    let json = std::fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let persisted: PersistedBuckets =
        serde_json::from_str(&json).map_err(|source| PersistError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(persisted.into_buckets(protocol, ceiling))
}

/// Ingest, resolve and classify a set of batch files as one scope.
pub fn classify_files(
    protocol: Protocol,
    files: &[PathBuf],
    ceiling: u64,
) -> (DurationBuckets, IngestSummary) {
    let mut traces = TraceSet::new();
    let summary = traces.ingest_files(files);
    traces.resolve_all();
    let buckets = Classifier::new(protocol, ceiling).classify_all(&traces);
    (buckets, summary)
}

/// One experiment's batch files on disk.
#[derive(Debug, Clone)]
pub struct Experiment {
    base_dir: PathBuf,
    name: String,
}

impl Experiment {
    pub fn new(base_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_dir(&self, protocol: Protocol, run: u32) -> PathBuf {
        self.base_dir
            .join(protocol.to_string())
            .join(&self.name)
            .join(run.to_string())
    }

    /// `*.json` files of a run, sorted by name.
    pub fn batch_files(&self, protocol: Protocol, run: u32) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.run_dir(protocol, run))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Where a run's buckets are persisted under `output_dir`.
    pub fn run_file(&self, output_dir: &Path, protocol: Protocol, run: u32) -> PathBuf {
        output_dir
            .join(protocol.to_string())
            .join(&self.name)
            .join(format!("{run}.json"))
    }
}

/// A run that had batch files.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run: u32,
    pub buckets: DurationBuckets,
    pub report: LatencyReport,
    pub persisted: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProtocolResult {
    pub protocol: Protocol,
    pub runs: Vec<RunResult>,
    pub aggregate: LatencyReport,
}

/// Process every run of one protocol, writing report blocks to `out`.
pub fn run_protocol(
    experiment: &Experiment,
    protocol: Protocol,
    config: &AnalysisConfig,
    out: &mut dyn Write,
) -> anyhow::Result<ProtocolResult> {
    log::info!("Processing protocol: {protocol} ({})", experiment.name());
    let ceiling = config.duration_ceiling_us;
    let output_dir = config.output_dir.clone().unwrap_or_default();

    let mut runs = Vec::new();
    for run in 1..=config.runs {
        let files = match experiment.batch_files(protocol, run) {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                log::warn!(
                    "No batch files in {}; skipping run",
                    experiment.run_dir(protocol, run).display()
                );
                continue;
            }
            Err(e) => {
                log::warn!(
                    "Cannot list {}: {e}; skipping run",
                    experiment.run_dir(protocol, run).display()
                );
                continue;
            }
        };

        let (buckets, summary) = classify_files(protocol, &files, ceiling);
        if summary.files_loaded == 0 {
            log::warn!("No usable batch files for {protocol} run {run}");
        }

        let report = analyze(format!("{protocol} Run {run}"), &buckets, config.window());
        write_block(out, &report)?;

        let persisted = experiment.run_file(&output_dir, protocol, run);
        write_run_file(&persisted, &buckets, ceiling)?;

        runs.push(RunResult {
            run,
            buckets,
            report,
            persisted,
        });
    }

    let aggregate = aggregate(
        format!("Total {protocol}"),
        runs.iter().map(|r| &r.buckets),
        config,
    );
    write_block(out, &aggregate)?;

    Ok(ProtocolResult {
        protocol,
        runs,
        aggregate,
    })
}

/// Report over several scopes' buckets together.
pub fn aggregate<'a>(
    label: impl Into<String>,
    scopes: impl IntoIterator<Item = &'a DurationBuckets>,
    config: &AnalysisConfig,
) -> LatencyReport {
    let mut total = DurationBuckets::new();
    for buckets in scopes {
        total.merge(buckets);
    }
    analyze(label, &total, config.window())
}

/// Re-aggregate persisted run files of one protocol, skipping unreadable ones.
pub fn aggregate_run_files(
    label: impl Into<String>,
    protocol: Protocol,
    files: &[PathBuf],
    config: &AnalysisConfig,
) -> LatencyReport {
    let loaded: Vec<DurationBuckets> = files
        .iter()
        .filter_map(|path| {
            match load_run_file(path, protocol, config.duration_ceiling_us) {
                Ok(buckets) => Some(buckets),
                Err(e) => {
                    log::warn!("{e}; skipping");
                    None
                }
            }
        })
        .collect();
    aggregate(label, &loaded, config)
}

pub fn write_block(out: &mut dyn Write, report: &LatencyReport) -> anyhow::Result<()> {
    writeln!(out)
        .and_then(|()| write!(out, "{}", render(report)))
        .with_context(|| format!("failed to write report for {}", report.label))
}
