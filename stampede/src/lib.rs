pub mod aggregator;
pub mod classify;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod logging;
pub mod outcome;
pub mod progress;
pub mod render;
pub mod report;
pub mod statistics;

pub use classify::{classify, FailureKind};
pub use config::{Config, ConfigError};
pub use dispatcher::{dispatch, run, Dispatch};
pub use executor::{Execute, HttpExecutor};
pub use outcome::{Failure, FailureStage, Outcome, OutcomeCode};
pub use render::OutputFormat;
pub use report::Report;
