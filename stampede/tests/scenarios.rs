use async_trait::async_trait;
use stampede::classify::FailureKind;
use stampede::config::{Config, ConfigError};
use stampede::dispatcher::{dispatch, run};
use stampede::executor::Execute;
use stampede::outcome::{Failure, FailureStage, Outcome, OutcomeCode};
use stampede::render::{self, OutputFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TARGET: &str = "http://127.0.0.1:9/";

struct Sleepy {
    status: u16,
    latency: Duration,
}

#[async_trait]
impl Execute for Sleepy {
    async fn execute(&self, _config: &Config) -> Outcome {
        tokio::time::sleep(self.latency).await;
        Outcome::response(self.status, self.latency)
    }
}

/// Alternates success and refused connections, starting with success.
#[derive(Default)]
struct Flaky {
    calls: AtomicUsize,
}

#[async_trait]
impl Execute for Flaky {
    async fn execute(&self, _config: &Config) -> Outcome {
        let call = self.calls.fetch_add(1, Ordering::AcqRel);
        if call % 2 == 0 {
            Outcome::response(200, Duration::from_millis(5))
        } else {
            Outcome::failed(
                Failure::from_message(
                    FailureStage::Transport,
                    "dial tcp 127.0.0.1:9: connect: connection refused",
                ),
                Duration::ZERO,
            )
        }
    }
}

struct TimesOut {
    elapsed: Duration,
}

#[async_trait]
impl Execute for TimesOut {
    async fn execute(&self, _config: &Config) -> Outcome {
        Outcome::failed(
            Failure::from_message(FailureStage::Transport, "request timed out after 1s"),
            self.elapsed,
        )
    }
}

/// Records how many attempts run at once.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl Execute for Gauge {
    async fn execute(&self, _config: &Config) -> Outcome {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        tokio::time::sleep(Duration::from_millis(3)).await;
        self.current.fetch_sub(1, Ordering::AcqRel);
        Outcome::response(200, Duration::from_millis(3))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_successful() {
    let executor = Arc::new(Sleepy {
        status: 200,
        latency: Duration::from_millis(10),
    });
    let config = Config::new(TARGET, 10).with_concurrency(2);
    let report = run(config, executor).await.unwrap();

    assert_eq!(10, report.total_requests);
    assert_eq!(0, report.errors);
    assert_eq!(10, report.count(OutcomeCode::Status(200)));
    assert_eq!(1, report.outcomes.len());
    assert_eq!(10, report.durations.len());
    assert_eq!(Some(Duration::from_millis(10)), report.min_duration);
    assert_eq!(Some(Duration::from_millis(10)), report.max_duration);
    assert_eq!(Some(Duration::from_millis(10)), report.avg_duration);
    assert_eq!(Some(Duration::ZERO), report.std_deviation);
    for (p, value) in report.percentiles() {
        assert_eq!(Some(Duration::from_millis(10)), value, "P{p}");
    }
    assert!(report.error_details.is_empty());
    // Five waves of two, each at least 10ms
    assert!(report.total_time >= Duration::from_millis(50), "{:?}", report.total_time);
    assert!(report.rps > 0.0);
}

#[tokio::test]
async fn mixed_success_and_refusals() {
    let executor = Arc::new(Flaky::default());
    let config = Config::new(TARGET, 5).with_concurrency(1);
    let report = run(config, executor).await.unwrap();

    assert_eq!(5, report.total_requests);
    assert_eq!(2, report.errors);
    assert_eq!(3, report.count(OutcomeCode::Status(200)));
    assert_eq!(2, report.count(OutcomeCode::Synthetic(503)));
    assert_eq!(Some(&3), report.status_codes().get(&200));
    assert_eq!(Some(&2), report.status_codes().get(&503));
    assert_eq!(3, report.durations.len());
    assert!(report.durations.iter().all(|d| *d == Duration::from_millis(5)));

    assert_eq!(1, report.error_details.len());
    let detail = report.error_details_by_count()[0];
    assert_eq!(2, detail.count);
    assert_eq!(503, detail.code);
    assert_eq!(FailureKind::ConnectionRefused, detail.kind);
    assert_eq!(report.errors, report.error_details.values().map(|d| d.count).sum::<usize>());
}

#[tokio::test]
async fn timeout_is_408() {
    let config = Config::new(TARGET, 1);
    let report = run(config.clone(), Arc::new(TimesOut { elapsed: Duration::ZERO }))
        .await
        .unwrap();
    assert_eq!(1, report.count(OutcomeCode::Synthetic(408)));
    assert_eq!(1, report.errors);
    assert!(report.durations.is_empty());
    assert_eq!(None, report.min_duration);
    assert_eq!(None, report.avg_duration);
    assert_eq!(None, report.percentile(50.0));

    let elapsed = Duration::from_millis(7);
    let report = run(config, Arc::new(TimesOut { elapsed })).await.unwrap();
    assert_eq!(1, report.count(OutcomeCode::Synthetic(408)));
    assert_eq!(vec![elapsed], report.durations);
    assert_eq!(Some(elapsed), report.min_duration);
}

/// Panics on every third call.
#[derive(Default)]
struct Explosive {
    calls: AtomicUsize,
}

#[async_trait]
impl Execute for Explosive {
    async fn execute(&self, _config: &Config) -> Outcome {
        if self.calls.fetch_add(1, Ordering::AcqRel) % 3 == 2 {
            panic!("executor bug");
        }
        Outcome::response(200, Duration::from_millis(2))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_executor_keeps_every_attempt() {
    let config = Config::new(TARGET, 9).with_concurrency(3);
    let report = run(config, Arc::new(Explosive::default())).await.unwrap();
    assert_eq!(9, report.total_requests);
    assert_eq!(9, report.outcomes.values().sum::<usize>());
    assert_eq!(3, report.errors);
    assert_eq!(6, report.count(OutcomeCode::Status(200)));
    assert_eq!(3, report.count(OutcomeCode::Synthetic(500)));
    let detail = report.error_details_by_count()[0];
    assert_eq!(3, detail.count);
    assert!(detail.message.starts_with("executor panicked"), "{}", detail.message);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded() {
    for concurrency in [1, 3, 8] {
        let gauge = Arc::new(Gauge::default());
        let config = Config::new(TARGET, 40).with_concurrency(concurrency);
        let report = run(config, gauge.clone()).await.unwrap();
        assert_eq!(40, report.total_requests);
        assert_eq!(40, gauge.calls.load(Ordering::Acquire));
        let peak = gauge.peak.load(Ordering::Acquire);
        assert!(peak <= concurrency, "peak {peak} > {concurrency}");
        assert!(peak >= 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrency_above_requests() {
    let gauge = Arc::new(Gauge::default());
    let config = Config::new(TARGET, 3).with_concurrency(64);
    let report = run(config, gauge.clone()).await.unwrap();
    assert_eq!(3, report.total_requests);
    assert!(gauge.peak.load(Ordering::Acquire) <= 3);
}

#[tokio::test]
async fn histogram_accounts_for_every_attempt() {
    let report = run(Config::new(TARGET, 9), Arc::new(Flaky::default()))
        .await
        .unwrap();
    assert_eq!(report.total_requests, report.outcomes.values().sum::<usize>());
    assert!(report.errors <= report.total_requests);
    assert!(report.durations.len() <= report.total_requests);
    let (min, max, avg) = (
        report.min_duration.unwrap(),
        report.max_duration.unwrap(),
        report.avg_duration.unwrap(),
    );
    assert!(min <= avg && avg <= max);
    let p50 = report.percentile(50.0).unwrap();
    let p99 = report.percentile(99.0).unwrap();
    assert!(min <= p50 && p50 <= p99 && p99 <= max);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_dispatch() {
    let gauge = Arc::new(Gauge::default());
    let zero = Config::new(TARGET, 0);
    assert!(matches!(
        dispatch(Arc::new(zero), gauge.clone()),
        Err(ConfigError::ZeroRequests)
    ));
    let no_url = Config::new("", 1);
    assert!(matches!(
        dispatch(Arc::new(no_url), gauge.clone()),
        Err(ConfigError::MissingUrl)
    ));
    assert_eq!(0, gauge.calls.load(Ordering::Acquire));
}

#[tokio::test]
async fn every_format_renders() {
    let report = run(Config::new(TARGET, 4), Arc::new(Flaky::default()))
        .await
        .unwrap();
    for format in [OutputFormat::Plain, OutputFormat::Json, OutputFormat::Csv] {
        let text = render::render(&report, format).unwrap();
        assert!(!text.is_empty());
    }
    let text = render::render(&report, OutputFormat::Plain).unwrap();
    assert!(text.contains("Status 503 (Service Unavailable): 2 requests (50.0%)"), "{text}");
}
