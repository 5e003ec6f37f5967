use crate::classify::FailureKind;
use crate::outcome::OutcomeCode;
use crate::statistics;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Percentiles every renderer prints.
pub const REPORTED_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

/// Occurrences of one distinct failure message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub count: usize,
    pub message: String,
    /// Code of the first failure seen with this message.
    pub code: u16,
    pub kind: FailureKind,
}

/// The finished result of a run. Never mutated after the aggregator hands it out.
///
/// Latency fields are `None` when no attempt reached the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub total_time: Duration,
    pub total_requests: usize,
    pub outcomes: BTreeMap<OutcomeCode, usize>,
    pub errors: usize,
    /// Non-zero latencies in arrival order.
    pub durations: Vec<Duration>,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub avg_duration: Option<Duration>,
    pub rps: f64,
    pub std_deviation: Option<Duration>,
    pub error_details: HashMap<String, ErrorDetail>,
}

impl Report {
    /// Outcome counts keyed by plain number, merging real and synthetic codes.
    #[must_use]
    pub fn status_codes(&self) -> BTreeMap<u16, usize> {
        let mut codes = BTreeMap::new();
        for (code, count) in &self.outcomes {
            *codes.entry(code.as_u16()).or_insert(0) += count;
        }
        codes
    }

    #[inline]
    #[must_use]
    pub fn count(&self, code: OutcomeCode) -> usize {
        self.outcomes.get(&code).copied().unwrap_or(0)
    }

    #[inline]
    #[must_use]
    pub fn has_latency(&self) -> bool {
        !self.durations.is_empty()
    }

    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        statistics::percentile(&self.durations, p)
    }

    /// The [`REPORTED_PERCENTILES`], sorting the sample once.
    #[must_use]
    pub fn percentiles(&self) -> Vec<(f64, Option<Duration>)> {
        let mut sorted = self.durations.clone();
        sorted.sort_unstable();
        REPORTED_PERCENTILES
            .iter()
            .map(|p| (*p, statistics::percentile_sorted(&sorted, *p)))
            .collect()
    }

    /// Share of all attempts, in percent.
    #[must_use]
    pub fn share(&self, count: usize) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let share = count as f64 / self.total_requests as f64 * 100.0;
        share
    }

    /// Error details, most frequent first. Ties are ordered by message.
    #[must_use]
    pub fn error_details_by_count(&self) -> Vec<&ErrorDetail> {
        let mut details: Vec<&ErrorDetail> = self.error_details.values().collect();
        details.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        details
    }
}
