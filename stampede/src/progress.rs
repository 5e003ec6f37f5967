use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let percent = self.completed as f64 / self.total as f64 * 100.0;
        percent
    }

    /// Completions per second since dispatch started.
    #[must_use]
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.completed as f64 / secs;
            rate
        } else {
            0.0
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Progress: {:.1}% ({}/{}) | Rate: {:.2} req/s",
            self.percent(),
            self.completed,
            self.total,
            self.rate()
        )
    }
}

/// Redraws a single progress line on every update until the dispatcher is done.
///
/// Updates may be coalesced, the line only ever moves forward. Resolves to the last count seen.
pub async fn observe<W: Write>(
    mut updates: watch::Receiver<usize>,
    total: usize,
    started: Instant,
    mut out: W,
) -> io::Result<usize> {
    let mut completed = 0;
    loop {
        let closed = updates.changed().await.is_err();
        let latest = *updates.borrow_and_update();
        if latest > completed {
            completed = latest;
            let progress = Progress {
                completed,
                total,
                elapsed: started.elapsed(),
            };
            write!(out, "\r{progress}")?;
            out.flush()?;
        }
        if closed {
            break;
        }
    }
    writeln!(out)?;
    out.flush()?;
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_line() {
        let progress = Progress {
            completed: 42,
            total: 100,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!("Progress: 42.0% (42/100) | Rate: 21.00 req/s", progress.to_string());
    }

    #[test]
    fn zero_elapsed_has_zero_rate() {
        let progress = Progress {
            completed: 1,
            total: 1,
            elapsed: Duration::ZERO,
        };
        assert_eq!(0.0, progress.rate());
        assert_eq!(100.0, progress.percent());
    }

    #[tokio::test]
    async fn observes_until_sender_drops() {
        let (tx, rx) = watch::channel(0usize);
        let observer = tokio::spawn(observe(rx, 3, Instant::now(), Vec::new()));
        for _ in 0..3 {
            tx.send_modify(|c| *c += 1);
            tokio::task::yield_now().await;
        }
        drop(tx);
        let completed = observer.await.unwrap().unwrap();
        assert_eq!(3, completed);
    }

    #[tokio::test]
    async fn writes_final_line() {
        let (tx, rx) = watch::channel(0usize);
        tx.send_modify(|c| *c += 2);
        drop(tx);
        let mut out = Vec::new();
        let completed = observe(rx, 2, Instant::now(), &mut out).await.unwrap();
        assert_eq!(2, completed);
        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("\rProgress: 100.0% (2/2)"), "{line:?}");
        assert!(line.ends_with('\n'));
    }
}
