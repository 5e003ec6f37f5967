use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_METHOD: &str = "GET";

/// What to hit, how often, and how hard. Read-only once a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub url: String,
    pub requests: usize,
    pub concurrency: usize,
    pub timeout: Duration,
    /// Kept as text, an unparseable method surfaces per attempt rather than up front.
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a target URL is required")]
    MissingUrl,
    #[error("the number of requests must be greater than zero")]
    ZeroRequests,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("the per-request timeout must be greater than zero")]
    ZeroTimeout,
}

impl Config {
    /// A single-connection `GET` run with the default timeout.
    #[must_use]
    pub fn new(url: impl Into<String>, requests: usize) -> Self {
        Self {
            url: url.into(),
            requests,
            concurrency: 1,
            timeout: DEFAULT_TIMEOUT,
            method: DEFAULT_METHOD.to_string(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets a header, replacing any earlier value for the same key.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Rejects configurations that must not start a run at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if self.requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
