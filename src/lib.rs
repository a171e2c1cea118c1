pub mod config;
pub mod experiment;
pub mod trace;

// Re-export the pipeline entry points for convenience
pub use config::AnalysisConfig;
pub use trace::{Classifier, Protocol, TraceSet};
