//! Maps transport failures onto status-like codes so they can share the status histogram.
//!
//! The checks run in a fixed order and the first one that matches wins. Each check looks at
//! typed errors in the source chain first and falls back to substrings of the rendered chain,
//! so failures that only survive as text (e.g. a stubbed executor) land in the same bucket.
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::io;

/// Why an attempt did not produce a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Temporary,
    ConnectionRefused,
    HostNotFound,
    Certificate,
    ConnectionReset,
    UnexpectedEof,
    Transport,
    TooManyRedirects,
    Unknown,
}

impl FailureKind {
    /// The synthetic code tallied for this kind.
    ///
    /// 310 and 495 are not real statuses, they only mark redirect loops and trust failures.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Timeout => 408,
            Self::Temporary | Self::ConnectionRefused => 503,
            Self::HostNotFound => 404,
            Self::Certificate => 495,
            Self::ConnectionReset | Self::UnexpectedEof | Self::Transport | Self::Unknown => 500,
            Self::TooManyRedirects => 310,
        }
    }

    /// Stable identifier, safe to use as a metric label.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Temporary => "temporary",
            Self::ConnectionRefused => "connection_refused",
            Self::HostNotFound => "host_not_found",
            Self::Certificate => "certificate",
            Self::ConnectionReset => "connection_reset",
            Self::UnexpectedEof => "unexpected_eof",
            Self::Transport => "transport",
            Self::TooManyRedirects => "too_many_redirects",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

type Check = fn(&[&(dyn Error + 'static)], &str) -> Option<FailureKind>;

const CHECKS: [Check; 7] = [
    timeout,
    temporary,
    refused,
    host_not_found,
    certificate,
    broken_connection,
    redirects,
];

/// Classifies an error by walking its whole source chain.
#[must_use]
pub fn classify(err: &(dyn Error + 'static)) -> FailureKind {
    let chain = flatten(err);
    let text = chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
        .to_lowercase();
    run_checks(&chain, &text)
}

/// Classifies a bare failure message.
#[must_use]
pub fn classify_message(message: &str) -> FailureKind {
    run_checks(&[], &message.to_lowercase())
}

/// Renders an error and its sources as a single `outer: inner: root` line.
#[must_use]
pub fn describe(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(e) = next {
        let msg = e.to_string();
        // io::Error displays its wrapped error, skip the repeat
        if !msg.is_empty() && !out.ends_with(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        next = e.source();
    }
    out
}

fn run_checks(chain: &[&(dyn Error + 'static)], text: &str) -> FailureKind {
    CHECKS
        .iter()
        .find_map(|check| check(chain, text))
        .unwrap_or(FailureKind::Unknown)
}

/// The source chain, with the payload of custom `io::Error`s spliced in.
fn flatten<'a>(err: &'a (dyn Error + 'static)) -> Vec<&'a (dyn Error + 'static)> {
    let mut out: Vec<&'a (dyn Error + 'static)> = Vec::new();
    let mut next = Some(err);
    while let Some(e) = next {
        out.push(e);
        if let Some(inner) = e.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            out.push(inner);
        }
        next = e.source();
    }
    out
}

fn io_kinds<'a>(
    chain: &'a [&'a (dyn Error + 'static)],
) -> impl Iterator<Item = io::ErrorKind> + 'a {
    chain
        .iter()
        .filter_map(|e| e.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}

fn hyper_errors<'a>(
    chain: &'a [&'a (dyn Error + 'static)],
) -> impl Iterator<Item = &'a hyper::Error> + 'a {
    chain.iter().filter_map(|e| e.downcast_ref::<hyper::Error>())
}

#[inline]
fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn timeout(chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    let typed = chain
        .iter()
        .any(|e| e.is::<tokio::time::error::Elapsed>())
        || io_kinds(chain).any(|k| k == io::ErrorKind::TimedOut)
        || hyper_errors(chain).any(hyper::Error::is_timeout);
    let textual = contains_any(
        text,
        &[
            "deadline exceeded",
            "deadline has elapsed",
            "timed out",
            "i/o timeout",
            "handshake timeout",
            "timeout",
        ],
    );
    (typed || textual).then_some(FailureKind::Timeout)
}

fn temporary(chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    let typed = io_kinds(chain)
        .any(|k| matches!(k, io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted));
    let textual = text.contains("temporar");
    (typed || textual).then_some(FailureKind::Temporary)
}

fn refused(chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    let typed = io_kinds(chain).any(|k| k == io::ErrorKind::ConnectionRefused);
    (typed || text.contains("connection refused")).then_some(FailureKind::ConnectionRefused)
}

fn host_not_found(_chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    contains_any(
        text,
        &[
            "dns error",
            "failed to lookup address",
            "no such host",
            "name or service not known",
            "nodename nor servname",
        ],
    )
    .then_some(FailureKind::HostNotFound)
}

fn certificate(chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    let typed = chain.iter().any(|e| {
        matches!(
            e.downcast_ref::<rustls::Error>(),
            Some(rustls::Error::InvalidCertificate(_) | rustls::Error::NoCertificatesPresented)
        )
    });
    let textual = contains_any(text, &["certificate", "x509", "unknownissuer"]);
    (typed || textual).then_some(FailureKind::Certificate)
}

fn broken_connection(chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    let reset = io_kinds(chain).any(|k| {
        matches!(
            k,
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        )
    }) || hyper_errors(chain).any(|e| e.is_closed() || e.is_canceled())
        || text.contains("connection reset");
    if reset {
        return Some(FailureKind::ConnectionReset);
    }
    let eof = io_kinds(chain).any(|k| k == io::ErrorKind::UnexpectedEof)
        || hyper_errors(chain).any(hyper::Error::is_incomplete_message)
        || contains_any(text, &["eof", "connection closed", "incomplete message"]);
    if eof {
        return Some(FailureKind::UnexpectedEof);
    }
    let transport = hyper_errors(chain).next().is_some()
        || chain
            .iter()
            .any(|e| e.is::<hyper_util::client::legacy::Error>())
        || contains_any(text, &["client error", "error sending request"]);
    transport.then_some(FailureKind::Transport)
}

fn redirects(_chain: &[&(dyn Error + 'static)], text: &str) -> Option<FailureKind> {
    let stopped = text.contains("stopped after") && text.contains("redirects");
    (stopped || text.contains("too many redirects")).then_some(FailureKind::TooManyRedirects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapped {
        msg: &'static str,
        source: io::Error,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.source)
        }
    }

    #[test]
    fn codes_follow_the_reporting_convention() {
        assert_eq!(408, FailureKind::Timeout.code());
        assert_eq!(503, FailureKind::Temporary.code());
        assert_eq!(503, FailureKind::ConnectionRefused.code());
        assert_eq!(404, FailureKind::HostNotFound.code());
        assert_eq!(495, FailureKind::Certificate.code());
        assert_eq!(500, FailureKind::ConnectionReset.code());
        assert_eq!(500, FailureKind::UnexpectedEof.code());
        assert_eq!(500, FailureKind::Transport.code());
        assert_eq!(310, FailureKind::TooManyRedirects.code());
        assert_eq!(500, FailureKind::Unknown.code());
    }

    #[test]
    fn classifies_messages() {
        let cases = [
            ("context deadline exceeded", FailureKind::Timeout),
            ("dial tcp 10.0.0.1:80: i/o timeout", FailureKind::Timeout),
            ("net/http: TLS handshake timeout", FailureKind::Timeout),
            ("temporary failure in name resolution", FailureKind::Temporary),
            ("dial tcp 127.0.0.1:1: connect: connection refused", FailureKind::ConnectionRefused),
            ("dial tcp: lookup nope.invalid: no such host", FailureKind::HostNotFound),
            ("dns error: failed to lookup address information", FailureKind::HostNotFound),
            ("x509: certificate signed by unknown authority", FailureKind::Certificate),
            ("read tcp: connection reset by peer", FailureKind::ConnectionReset),
            ("unexpected EOF", FailureKind::UnexpectedEof),
            ("connection closed before message completed", FailureKind::UnexpectedEof),
            ("client error (SendRequest)", FailureKind::Transport),
            ("stopped after 10 redirects", FailureKind::TooManyRedirects),
            ("something else entirely", FailureKind::Unknown),
            ("", FailureKind::Unknown),
        ];
        for (msg, expected) in cases {
            assert_eq!(expected, classify_message(msg), "{msg}");
        }
    }

    #[test]
    fn earlier_checks_win() {
        // Both a timeout and a refusal, timeout is checked first
        assert_eq!(
            FailureKind::Timeout,
            classify_message("connection refused after timeout")
        );
        // A refused dial that also mentions the generic client error
        assert_eq!(
            FailureKind::ConnectionRefused,
            classify_message("client error (Connect): connection refused")
        );
    }

    #[test]
    fn classifies_typed_io_errors_in_chain() {
        let refused = Wrapped {
            msg: "tcp connect error",
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(FailureKind::ConnectionRefused, classify(&refused));

        let reset = Wrapped {
            msg: "read failed",
            source: io::Error::from(io::ErrorKind::ConnectionReset),
        };
        assert_eq!(FailureKind::ConnectionReset, classify(&reset));

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(FailureKind::Timeout, classify(&timed_out));
    }

    #[tokio::test]
    async fn classifies_elapsed_deadline() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert_eq!(FailureKind::Timeout, classify(&elapsed));
    }

    #[test]
    fn classification_is_deterministic() {
        let msg = "dial tcp 127.0.0.1:9: connect: connection refused";
        let first = classify_message(msg);
        for _ in 0..10 {
            assert_eq!(first, classify_message(msg));
        }
    }

    #[test]
    fn describes_source_chain() {
        let err = Wrapped {
            msg: "tcp connect error",
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };
        assert_eq!("tcp connect error: boom", describe(&err));
    }
}
