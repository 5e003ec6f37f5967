//! A small HTTP/1 target for exercising load runs in-process.
//!
//! Routes:
//! - `/` answers `200 ok` to `GET`, `405` otherwise
//! - `/status/{code}` answers with the given status
//! - `/delay/{ms}` sleeps, then answers `200`
//! - `/echo` answers with the request body
//! - `/stats` answers with a JSON [`StatsResponse`](crate::StatsResponse)
use crate::drain::DrainBodyFuture;
use crate::{byte_body, empty_body, RecordedRequest, SharedCounter};
use anyhow::Context;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct TargetServer {
    addr: SocketAddr,
    counter: SharedCounter,
    accept_loop: JoinHandle<()>,
}

impl TargetServer {
    /// Binds an ephemeral port on loopback and starts serving on the current runtime.
    pub async fn start() -> anyhow::Result<Self> {
        let sock = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind target server")?;
        let addr = sock
            .local_addr()
            .context("Failed to read target server address")?;
        let counter = SharedCounter::new();
        let shared = counter.clone();
        let accept_loop = tokio::task::spawn(async move {
            loop {
                let Ok((tcp, _peer)) = sock.accept().await else {
                    continue;
                };
                let tcp = TokioIo::new(tcp);
                let sc = shared.clone();
                let service = service_fn(move |req| target_service(sc.clone(), req));
                tokio::task::spawn(
                    hyper::server::conn::http1::Builder::new().serve_connection(tcp, service),
                );
            }
        });
        Ok(Self {
            addr,
            counter,
            accept_loop,
        })
    }

    #[inline]
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    #[inline]
    #[must_use]
    pub fn counter(&self) -> &SharedCounter {
        &self.counter
    }
}

impl Drop for TargetServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn target_service(
    counter: SharedCounter,
    incoming: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let _in_flight = counter.enter();
    let (parts, body) = incoming.into_parts();
    let body = DrainBodyFuture::new_trusted_length(body, 512)
        .await
        .unwrap_or_default();
    counter.record(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect(),
        body: body.clone(),
    });

    let path = parts.uri.path().trim_start_matches('/');
    let mut segments = path.splitn(2, '/');
    let resp = match (segments.next(), segments.next()) {
        (Some(""), None) => {
            if parts.method == Method::GET {
                respond(StatusCode::OK, byte_body(&b"ok"[..]))
            } else {
                respond(StatusCode::METHOD_NOT_ALLOWED, empty_body())
            }
        }
        (Some("status"), Some(code)) => {
            match code.parse::<u16>().ok().and_then(|c| StatusCode::from_u16(c).ok()) {
                Some(status) => respond(status, empty_body()),
                None => respond(StatusCode::BAD_REQUEST, empty_body()),
            }
        }
        (Some("delay"), Some(ms)) => match ms.parse::<u64>() {
            Ok(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                respond(StatusCode::OK, empty_body())
            }
            Err(_) => respond(StatusCode::BAD_REQUEST, empty_body()),
        },
        (Some("echo"), None) => respond(StatusCode::OK, byte_body(body)),
        (Some("stats"), None) => match serde_json::to_vec(&counter.snapshot()) {
            Ok(payload) => respond(StatusCode::OK, byte_body(payload)),
            Err(_) => respond(StatusCode::INTERNAL_SERVER_ERROR, empty_body()),
        },
        _ => respond(StatusCode::NOT_FOUND, empty_body()),
    };
    Ok(resp)
}

#[inline]
fn respond(status: StatusCode, body: Full<Bytes>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp
}
