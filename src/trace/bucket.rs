//! Classified request durations, split into `SUCCESS` and `FAILURE`.

use serde::{Deserialize, Serialize};

/// Which bucket a classified request lands in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

/// One request's latency.
///
/// `Unmeasurable` is a failed request whose duration could not be derived
/// (an async send or receive span was missing). It counts as a request but
/// never takes part in latency statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// Duration in microseconds.
    Measured(u64),
    Unmeasurable,
}

impl Sample {
    pub fn measured(self) -> Option<u64> {
        match self {
            Sample::Measured(micros) => Some(micros),
            Sample::Unmeasurable => None,
        }
    }

    /// Flat microsecond value for persistence; unmeasurable becomes `ceiling + 1`.
    pub fn to_micros(self, ceiling: u64) -> u64 {
        self.measured().unwrap_or(ceiling.saturating_add(1))
    }

    /// Inverse of [`Sample::to_micros`] for a value read from the `FAILURE` bucket.
    ///
    /// Only valid for async protocols: a sync failure can genuinely last
    /// `ceiling + 1`.
    pub fn from_failure_micros(micros: u64, ceiling: u64) -> Self {
        if micros == ceiling.saturating_add(1) {
            Sample::Unmeasurable
        } else {
            Sample::Measured(micros)
        }
    }
}

/// The verdict for one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub sample: Sample,
}

impl Classification {
    pub fn success(micros: u64) -> Self {
        Self {
            outcome: Outcome::Success,
            sample: Sample::Measured(micros),
        }
    }

    pub fn failure(sample: Sample) -> Self {
        Self {
            outcome: Outcome::Failure,
            sample,
        }
    }
}

/// Samples for one reporting scope (a run, or an aggregate of runs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationBuckets {
    pub success: Vec<Sample>,
    pub failure: Vec<Sample>,
}

impl DurationBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, classification: Classification) {
        self.bucket_mut(classification.outcome)
            .push(classification.sample);
    }

    pub fn bucket(&self, outcome: Outcome) -> &[Sample] {
        match outcome {
            Outcome::Success => &self.success,
            Outcome::Failure => &self.failure,
        }
    }

    fn bucket_mut(&mut self, outcome: Outcome) -> &mut Vec<Sample> {
        match outcome {
            Outcome::Success => &mut self.success,
            Outcome::Failure => &mut self.failure,
        }
    }

    /// Append another scope's samples (aggregation across runs).
    pub fn merge(&mut self, other: &DurationBuckets) {
        self.success.extend_from_slice(&other.success);
        self.failure.extend_from_slice(&other.failure);
    }

    /// Number of classified requests in both buckets.
    pub fn total(&self) -> usize {
        self.success.len() + self.failure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Measured durations from both buckets.
    pub fn measured(&self) -> impl Iterator<Item = u64> + '_ {
        self.success
            .iter()
            .chain(&self.failure)
            .filter_map(|sample| sample.measured())
    }
}

impl FromIterator<Classification> for DurationBuckets {
    fn from_iter<I: IntoIterator<Item = Classification>>(iter: I) -> Self {
        let mut buckets = DurationBuckets::new();
        for classification in iter {
            buckets.push(classification);
        }
        buckets
    }
}
