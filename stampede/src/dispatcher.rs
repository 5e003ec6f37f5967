use crate::aggregator::Aggregator;
use crate::config::{Config, ConfigError};
use crate::executor::Execute;
use crate::outcome::{Failure, FailureStage, Outcome};
use crate::report::Report;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};

/// A run in progress: every attempt task is spawned, their outcomes arrive on `outcomes`.
pub struct Dispatch {
    started: Instant,
    total: usize,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    progress: watch::Receiver<usize>,
}

/// Spawns one task per requested attempt, at most `config.concurrency` of which run the
/// executor at any instant.
///
/// An invalid config spawns nothing. Must be called within a tokio runtime.
pub fn dispatch<E>(config: Arc<Config>, executor: Arc<E>) -> Result<Dispatch, ConfigError>
where
    E: Execute + ?Sized + 'static,
{
    config.validate()?;
    tracing::info!(
        url = %config.url,
        method = %config.method,
        requests = config.requests,
        concurrency = config.concurrency,
        timeout = ?config.timeout,
        "dispatching"
    );

    let admission = Arc::new(Semaphore::new(config.concurrency.min(Semaphore::MAX_PERMITS)));
    let (result_tx, outcomes) = mpsc::unbounded_channel();
    let (progress_tx, progress) = watch::channel(0usize);
    let progress_tx = Arc::new(progress_tx);
    let started = Instant::now();

    for attempt in 0..config.requests {
        let config = config.clone();
        let executor = executor.clone();
        let admission = admission.clone();
        let result_tx = result_tx.clone();
        let progress_tx = progress_tx.clone();
        tokio::task::spawn(async move {
            let outcome = match admission.acquire().await {
                // The permit is released at the end of this arm, before delivery
                Ok(_permit) => execute_isolated(config, executor).await,
                Err(_closed) => Outcome::failed(
                    Failure::from_message(FailureStage::Build, "admission pool closed"),
                    Duration::ZERO,
                ),
            };
            if result_tx.send(outcome).is_err() {
                tracing::warn!(attempt, "outcome stream closed before delivery");
            }
            progress_tx.send_modify(|completed| *completed += 1);
        });
    }
    // The stream closes once the last task drops its sender
    drop(result_tx);

    Ok(Dispatch {
        started,
        total: config.requests,
        outcomes,
        progress,
    })
}

/// Runs one attempt in its own task, so a panicking executor still yields an outcome.
async fn execute_isolated<E>(config: Arc<Config>, executor: Arc<E>) -> Outcome
where
    E: Execute + ?Sized + 'static,
{
    let start = Instant::now();
    let joined = tokio::task::spawn(async move { executor.execute(&config).await }).await;
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = if e.is_panic() {
                format!("executor panicked: {}", panic_message(e.into_panic()))
            } else {
                "executor task was cancelled".to_string()
            };
            tracing::warn!(%message, "attempt aborted");
            Outcome::failed(
                Failure::from_message(FailureStage::Transport, message),
                start.elapsed(),
            )
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&'static str>()
            .map_or_else(|| "unknown panic".to_string(), |m| (*m).to_string()),
    }
}

/// Dispatches and aggregates in one go.
pub async fn run<E>(config: Config, executor: Arc<E>) -> Result<Report, ConfigError>
where
    E: Execute + ?Sized + 'static,
{
    Ok(dispatch(Arc::new(config), executor)?.collect().await)
}

impl Dispatch {
    #[inline]
    #[must_use]
    pub fn started(&self) -> Instant {
        self.started
    }

    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Completed-attempt count, updated after each outcome is delivered.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<usize> {
        self.progress.clone()
    }

    /// Consumes every outcome and finalizes the report once the stream closes.
    pub async fn collect(self) -> Report {
        let report = Aggregator::new(self.started, self.total)
            .consume(self.outcomes)
            .await;
        if report.total_requests != self.total {
            tracing::warn!(
                expected = self.total,
                received = report.total_requests,
                "attempts went missing"
            );
        }
        report
    }
}
