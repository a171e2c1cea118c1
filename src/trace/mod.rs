//! Trace reconstruction, classification and latency analysis.
//!
//! Pipeline for one batch of Jaeger traces:
//!
//! 1. [`ingest`] loads batch files into a [`TraceSet`]
//! 2. [`resolve`] orders each trace's spans parent-first along `CHILD_OF` links
//! 3. [`classify`] buckets each trace as `SUCCESS` or `FAILURE` per [`Protocol`]
//! 4. [`analyze`] computes latency statistics and [`display`] renders them
//!
//! # Usage
//!
//! ```ignore
//! use tracelat::trace::{Classifier, Protocol, TraceSet, analyze, render};
//!
//! let mut traces = TraceSet::new();
//! traces.ingest_file(path)?;
//! traces.resolve_all();
//! let buckets = Classifier::new(Protocol::Rest, ceiling).classify_all(&traces);
//! println!("{}", render(&analyze("rest", &buckets, window)));
//! ```

pub mod analyze;
pub mod bucket;
pub mod classify;
pub mod display;
pub mod ingest;
pub mod model;
pub mod resolve;

pub use analyze::{BucketStats, LatencyReport, Summary, Unit, analyze};
pub use bucket::{Classification, DurationBuckets, Outcome, Sample};
pub use classify::{Classifier, DEFAULT_DURATION_CEILING, Protocol};
pub use display::render;
pub use ingest::{IngestError, IngestSummary, TraceSet};
pub use model::{KeyValue, LogEntry, Process, Reference, Span, Trace};
