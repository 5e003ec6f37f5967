use crate::outcome::{Outcome, OutcomeCode};
use crate::report::{ErrorDetail, Report};
use crate::statistics;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// Folds outcomes into a [`Report`].
///
/// Every update is a count, a sum, an extremum or an append, so the order outcomes arrive in
/// does not change the result.
pub struct Aggregator {
    started: Instant,
    total_requests: usize,
    outcomes: BTreeMap<OutcomeCode, usize>,
    errors: usize,
    durations: Vec<Duration>,
    min_duration: Option<Duration>,
    max_duration: Option<Duration>,
    error_details: HashMap<String, ErrorDetail>,
}

impl Aggregator {
    /// `started` is when dispatch began, the run's wall-clock time is measured from it.
    #[must_use]
    pub fn new(started: Instant, expected: usize) -> Self {
        Self {
            started,
            total_requests: 0,
            outcomes: BTreeMap::new(),
            errors: 0,
            durations: Vec::with_capacity(expected),
            min_duration: None,
            max_duration: None,
            error_details: HashMap::new(),
        }
    }

    /// Drains the stream until every sender is gone, then finalizes.
    pub async fn consume(mut self, mut outcomes: UnboundedReceiver<Outcome>) -> Report {
        while let Some(outcome) = outcomes.recv().await {
            self.record(outcome);
        }
        self.finish()
    }

    pub fn record(&mut self, outcome: Outcome) {
        self.total_requests += 1;
        *self.outcomes.entry(outcome.code()).or_insert(0) += 1;

        if let Some(failure) = outcome.failure() {
            self.errors += 1;
            tracing::debug!(
                code = failure.code(),
                kind = %failure.kind,
                stage = ?failure.stage,
                message = %failure.message,
                "attempt failed"
            );
            self.error_details
                .entry(failure.message.clone())
                .or_insert_with(|| ErrorDetail {
                    count: 0,
                    message: failure.message.clone(),
                    code: failure.code(),
                    kind: failure.kind,
                })
                .count += 1;
        }

        let elapsed = outcome.elapsed();
        if !elapsed.is_zero() {
            self.durations.push(elapsed);
            self.min_duration = Some(self.min_duration.map_or(elapsed, |min| min.min(elapsed)));
            self.max_duration = Some(self.max_duration.map_or(elapsed, |max| max.max(elapsed)));
        }
    }

    #[must_use]
    pub fn finish(self) -> Report {
        let total_time = self.started.elapsed();
        self.finish_with(total_time)
    }

    /// Finalizes with an explicit wall-clock time.
    #[must_use]
    pub fn finish_with(self, total_time: Duration) -> Report {
        let secs = total_time.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let rps = if secs > 0.0 {
            self.total_requests as f64 / secs
        } else {
            0.0
        };
        let avg_duration = statistics::mean(&self.durations);
        let std_deviation = statistics::std_deviation(&self.durations);
        tracing::info!(
            requests = self.total_requests,
            errors = self.errors,
            measured = self.durations.len(),
            elapsed = ?total_time,
            rps,
            "run finished"
        );
        Report {
            total_time,
            total_requests: self.total_requests,
            outcomes: self.outcomes,
            errors: self.errors,
            durations: self.durations,
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            avg_duration,
            rps,
            std_deviation,
            error_details: self.error_details,
        }
    }
}
