use crate::client::HttpClient;
use crate::config::Config;
use crate::outcome::Outcome;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use http_test_util::byte_body;
use http_test_util::drain::DiscardBodyFuture;
use hyper::Request;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Performs one attempt. Failures come back as an [`Outcome`], never as an error or a panic.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, config: &Config) -> Outcome;
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to build request")]
    Build(#[source] http::Error),
    #[error("invalid target URL {0:?}, expected an absolute http or https URL")]
    InvalidTarget(String),
    #[error("request timed out after {limit:?}")]
    Timeout {
        limit: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },
    #[error("error sending request")]
    Send(#[source] hyper_util::client::legacy::Error),
}

#[derive(Clone, Default)]
pub struct HttpExecutor {
    client: HttpClient,
}

impl HttpExecutor {
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Execute for HttpExecutor {
    async fn execute(&self, config: &Config) -> Outcome {
        let request = match build_request(config) {
            Ok(request) => request,
            Err(e) => return Outcome::build_failure(&e),
        };

        let start = Instant::now();
        let sent = tokio::time::timeout(config.timeout, self.client.send(request)).await;
        let elapsed = start.elapsed();
        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Outcome::transport_failure(&RequestError::Send(e), elapsed),
            Err(source) => {
                let err = RequestError::Timeout {
                    limit: config.timeout,
                    source,
                };
                return Outcome::transport_failure(&err, elapsed);
            }
        };

        let status = response.status().as_u16();
        // Reading the body to its end returns the connection to the pool
        let remaining = config.timeout.saturating_sub(elapsed);
        match tokio::time::timeout(remaining, DiscardBodyFuture::new(response.into_body())).await {
            Ok(Ok(_read)) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, status, "failed to drain response body"),
            Err(_) => tracing::debug!(status, "response body not drained within the timeout"),
        }
        Outcome::response(status, elapsed)
    }
}

fn build_request(config: &Config) -> Result<Request<Full<Bytes>>, RequestError> {
    let mut builder = Request::builder()
        .method(config.method.as_str())
        .uri(config.url.as_str());
    for (key, value) in &config.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    let request = builder
        .body(byte_body(config.body.clone()))
        .map_err(RequestError::Build)?;
    let uri = request.uri();
    let supported = matches!(uri.scheme_str(), Some("http" | "https")) && uri.host().is_some();
    if !supported {
        return Err(RequestError::InvalidTarget(config.url.clone()));
    }
    Ok(request)
}
