//! Latency statistics over classified durations.

use std::time::Duration;

use super::bucket::{DurationBuckets, Sample};

/// Display unit, picked from the mean so numbers stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Unit {
    #[strum(serialize = "μs")]
    Microseconds,
    #[strum(serialize = "ms")]
    Milliseconds,
    #[strum(serialize = "s")]
    Seconds,
}

impl Unit {
    /// Microseconds per unit.
    pub fn factor(self) -> f64 {
        match self {
            Unit::Microseconds => 1.0,
            Unit::Milliseconds => 1_000.0,
            Unit::Seconds => 1_000_000.0,
        }
    }

    pub fn for_mean(mean_micros: f64) -> Unit {
        if mean_micros < 1_000.0 {
            Unit::Microseconds
        } else if mean_micros < 1_000_000.0 {
            Unit::Milliseconds
        } else {
            Unit::Seconds
        }
    }
}

/// Pick one unit for both buckets from the mean of every measured sample.
pub fn choose_unit(buckets: &DurationBuckets) -> Unit {
    let (sum, count) = buckets
        .measured()
        .fold((0.0, 0usize), |(sum, count), micros| {
            (sum + micros as f64, count + 1)
        });
    if count == 0 {
        return Unit::Microseconds;
    }
    Unit::for_mean(sum / count as f64)
}

/// Descriptive statistics of a non-empty sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1 divisor); 0 for a single value.
    pub std_dev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Statistics for one bucket. `summary` is `None` when nothing was measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketStats {
    /// Requests in the bucket, measured or not.
    pub count: usize,
    pub summary: Option<Summary>,
}

impl BucketStats {
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Sample>, unit: Unit) -> Self {
        let mut count = 0;
        let mut values = Vec::new();
        for sample in samples {
            count += 1;
            if let Some(micros) = sample.measured() {
                values.push(micros as f64 / unit.factor());
            }
        }
        Self {
            count,
            summary: describe(&values),
        }
    }
}

/// Summarize `values`; `None` for an empty slice.
pub fn describe(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std_dev = if sorted.len() > 1 {
        let squares: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    Some(Summary {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean,
        std_dev,
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
    })
}

/// Percentile of sorted values, interpolating linearly between closest ranks.
///
/// Matches numpy's default: the rank is `pct / 100 * (n - 1)`.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Everything needed to print one report block.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyReport {
    pub label: String,
    pub unit: Unit,
    /// Both buckets together.
    pub all: BucketStats,
    pub ok: BucketStats,
    pub ko: BucketStats,
    /// Successful requests per second over the measurement window.
    pub requests_per_sec: f64,
}

impl LatencyReport {
    pub fn total_requests(&self) -> usize {
        self.ok.count + self.ko.count
    }
}

/// Compute the report for one scope (a run or an aggregate).
pub fn analyze(
    label: impl Into<String>,
    buckets: &DurationBuckets,
    window: Duration,
) -> LatencyReport {
    let unit = choose_unit(buckets);
    let ok = BucketStats::from_samples(&buckets.success, unit);
    let ko = BucketStats::from_samples(&buckets.failure, unit);
    let all = BucketStats::from_samples(buckets.success.iter().chain(&buckets.failure), unit);

    let window_secs = window.as_secs_f64();
    let requests_per_sec = if window_secs > 0.0 {
        ok.count as f64 / window_secs
    } else {
        0.0
    };

    LatencyReport {
        label: label.into(),
        unit,
        all,
        ok,
        ko,
        requests_per_sec,
    }
}
