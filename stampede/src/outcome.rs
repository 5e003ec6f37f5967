use crate::classify::{classify, classify_message, describe, FailureKind};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Where in the attempt a failure happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The request could not be built, nothing reached the network.
    Build,
    /// The request was issued but no response arrived.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub stage: FailureStage,
    pub message: String,
}

impl Failure {
    #[must_use]
    pub fn from_error(stage: FailureStage, err: &(dyn Error + 'static)) -> Self {
        Self {
            kind: classify(err),
            stage,
            message: describe(err),
        }
    }

    #[must_use]
    pub fn from_message(stage: FailureStage, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_message(&message),
            stage,
            message,
        }
    }

    #[inline]
    #[must_use]
    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

/// A histogram bucket: a status the server sent, or one the classifier made up.
///
/// Both collapse to the same number when rendered, a server `500` and a reset connection
/// end up in the same printed row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "source", content = "code", rename_all = "snake_case")]
pub enum OutcomeCode {
    Status(u16),
    Synthetic(u16),
}

impl OutcomeCode {
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Status(code) | Self::Synthetic(code) => code,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Synthetic(_))
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// The result of exactly one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Response { status: u16, elapsed: Duration },
    Failed { failure: Failure, elapsed: Duration },
}

impl Outcome {
    #[must_use]
    pub fn response(status: u16, elapsed: Duration) -> Self {
        Self::Response { status, elapsed }
    }

    /// A request that never left the process, it carries no latency.
    #[must_use]
    pub fn build_failure(err: &(dyn Error + 'static)) -> Self {
        Self::Failed {
            failure: Failure::from_error(FailureStage::Build, err),
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn transport_failure(err: &(dyn Error + 'static), elapsed: Duration) -> Self {
        Self::Failed {
            failure: Failure::from_error(FailureStage::Transport, err),
            elapsed,
        }
    }

    #[must_use]
    pub fn failed(failure: Failure, elapsed: Duration) -> Self {
        let elapsed = match failure.stage {
            FailureStage::Build => Duration::ZERO,
            FailureStage::Transport => elapsed,
        };
        Self::Failed { failure, elapsed }
    }

    #[must_use]
    pub fn code(&self) -> OutcomeCode {
        match self {
            Self::Response { status, .. } => OutcomeCode::Status(*status),
            Self::Failed { failure, .. } => OutcomeCode::Synthetic(failure.code()),
        }
    }

    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Response { elapsed, .. } | Self::Failed { elapsed, .. } => *elapsed,
        }
    }

    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Response { .. } => None,
            Self::Failed { failure, .. } => Some(failure),
        }
    }
}
