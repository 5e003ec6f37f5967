pub mod drain;
pub mod server;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use bytes::Bytes;
use http_body_util::Full;

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[inline]
pub fn byte_body<B: Into<Bytes>>(bytes: B) -> Full<Bytes> {
    Full::new(bytes.into())
}

/// Request bookkeeping shared between the target server's connections.
#[derive(Clone, Default)]
pub struct SharedCounter {
    hits: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<RecordedRequest>>>,
}

impl SharedCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a request as started, the returned guard marks it finished on drop.
    #[must_use]
    pub fn enter(&self) -> InFlightGuard {
        self.hits.fetch_add(1, Ordering::AcqRel);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn record(&self, request: RecordedRequest) {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
    }

    #[inline]
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last_request.lock().ok().and_then(|last| last.clone())
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsResponse {
        StatsResponse {
            hits: self.hits(),
            in_flight: self.in_flight.load(Ordering::Acquire),
            max_in_flight: self.max_in_flight(),
        }
    }
}

pub struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsResponse {
    pub hits: usize,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_max_in_flight() {
        let counter = SharedCounter::new();
        let a = counter.enter();
        let b = counter.enter();
        drop(a);
        let c = counter.enter();
        drop(b);
        drop(c);
        let stats = counter.snapshot();
        assert_eq!(3, stats.hits);
        assert_eq!(0, stats.in_flight);
        assert_eq!(2, stats.max_in_flight);
    }
}
