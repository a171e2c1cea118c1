//! Load Jaeger batch files into a [`TraceSet`].
//!
//! A batch file is `{"data": [{"traceID", "spans": [...], "processes"?: {...}}]}`.
//! Loading is lenient: a file that does not fit the schema is reported as an
//! [`IngestError`] and leaves the set untouched, while individual malformed
//! traces or spans are dropped with a warning and the rest of the file is kept.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Deserialize;

use super::model::{Process, Span, Trace};

/// A batch file that could not be used at all.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin} is not valid JSON")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no 'data' list found in {origin}")]
    MissingData { origin: String },
}

/// Counts from [`TraceSet::ingest_files`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub spans: usize,
}

#[derive(Deserialize)]
struct RawTrace {
    #[serde(rename = "traceID")]
    trace_id: String,
    spans: Vec<serde_json::Value>,
    #[serde(default)]
    processes: Option<IndexMap<String, Process>>,
}

/// Traces keyed by trace id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TraceSet {
    traces: IndexMap<String, Trace>,
}

impl TraceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one batch file, returning the number of spans accepted.
    pub fn ingest_file(&mut self, path: &Path) -> Result<usize, IngestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.ingest_str(&path.display().to_string(), &contents)
    }

    /// Load batch JSON from memory. `origin` names the source in diagnostics.
    pub fn ingest_str(&mut self, origin: &str, contents: &str) -> Result<usize, IngestError> {
        let batch: serde_json::Value =
            serde_json::from_str(contents).map_err(|source| IngestError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        let Some(entries) = batch.get("data").and_then(serde_json::Value::as_array) else {
            return Err(IngestError::MissingData {
                origin: origin.to_string(),
            });
        };

        let mut accepted = 0;
        for (position, entry) in entries.iter().enumerate() {
            let raw = match RawTrace::deserialize(entry) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("{origin}: skipping trace entry #{position}: {e}");
                    continue;
                }
            };
            accepted += self.ingest_trace(origin, raw);
        }

        log::debug!(
            "{origin}: {accepted} spans across {} traces",
            entries.len()
        );
        Ok(accepted)
    }

    /// Load every file in order, warning about and skipping files that fail.
    pub fn ingest_files<P: AsRef<Path>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for path in paths {
            let path = path.as_ref();
            log::info!("Processing file: {}", path.display());
            match self.ingest_file(path) {
                Ok(spans) => {
                    summary.files_loaded += 1;
                    summary.spans += spans;
                }
                Err(e) => {
                    log::warn!("{e}; skipping");
                    summary.files_skipped += 1;
                }
            }
        }
        summary
    }

    fn ingest_trace(&mut self, origin: &str, raw: RawTrace) -> usize {
        let processes = raw.processes.unwrap_or_default();
        let mut accepted = 0;

        for value in raw.spans {
            let mut span: Span = match serde_json::from_value(value) {
                Ok(span) => span,
                Err(e) => {
                    log::warn!("{origin}: dropping span in trace {}: {e}", raw.trace_id);
                    continue;
                }
            };

            if span.process.is_none() {
                span.process = span
                    .process_id
                    .as_ref()
                    .and_then(|id| processes.get(id))
                    .cloned();
            }
            if span.process.is_none() {
                log::warn!(
                    "{origin}: dropping span {} in trace {}: no process",
                    span.span_id,
                    raw.trace_id
                );
                continue;
            }
            if span.trace_id != raw.trace_id {
                log::debug!(
                    "{origin}: span {} claims trace {} but is listed under {}",
                    span.span_id,
                    span.trace_id,
                    raw.trace_id
                );
            }

            self.push_span(&raw.trace_id, span);
            accepted += 1;
        }
        accepted
    }

    /// File `span` under `trace_id`, creating the trace on first sight.
    pub fn push_span(&mut self, trace_id: &str, span: Span) {
        match self.traces.get_mut(trace_id) {
            Some(trace) => trace.push_span(span),
            None => {
                let mut trace = Trace::new(trace_id);
                trace.push_span(span);
                self.traces.insert(trace_id.to_string(), trace);
            }
        }
    }

    pub fn get(&self, trace_id: &str) -> Option<&Trace> {
        self.traces.get(trace_id)
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.values()
    }

    pub(crate) fn par_iter_mut(&mut self) -> impl ParallelIterator<Item = &mut Trace> {
        self.traces.par_values_mut()
    }
}

impl FromIterator<Trace> for TraceSet {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        let mut set = TraceSet::new();
        for trace in iter {
            for span in trace.spans {
                set.push_span(&trace.trace_id, span);
            }
        }
        set
    }
}
