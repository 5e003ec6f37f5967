use crate::config::{Config, ConfigError, DEFAULT_METHOD};
use crate::render::OutputFormat;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

/// Fire a fixed number of HTTP requests at a URL and report latency and status statistics.
#[derive(Debug, Clone, Parser)]
#[command(name = "stampede", version)]
pub struct Cli {
    /// URL to test
    #[arg(long, env = "STAMPEDE_URL")]
    pub url: Option<String>,

    /// Number of requests to make
    #[arg(short = 'n', long, default_value_t = 0)]
    pub requests: usize,

    /// Number of requests in flight at once
    #[arg(short = 'c', long, default_value_t = 1)]
    pub concurrency: usize,

    /// Timeout for each request, e.g. `500ms` or `10s`
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// HTTP method to use
    #[arg(short = 'X', long, default_value = DEFAULT_METHOD)]
    pub method: String,

    /// Extra request header, may be repeated
    #[arg(short = 'H', long = "header", value_name = "KEY: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short = 'd', long, default_value = "")]
    pub body: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    /// Do not draw the progress line
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CliError {
    #[error("URL and number of requests are required")]
    MissingTarget,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid header {0:?}, expected `Key: Value`")]
pub struct HeaderParseError(String);

/// Everything the binary needs to run and print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config: Config,
    pub format: OutputFormat,
    pub progress: bool,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings, CliError> {
        let url = match self.url {
            Some(url) if !url.trim().is_empty() && self.requests > 0 => url,
            _ => return Err(CliError::MissingTarget),
        };
        let mut config = Config::new(url, self.requests)
            .with_concurrency(self.concurrency)
            .with_timeout(self.timeout)
            .with_method(self.method)
            .with_body(self.body);
        for (key, value) in self.headers {
            config = config.with_header(key, value);
        }
        config.validate()?;
        Ok(Settings {
            config,
            format: self.format,
            progress: !self.no_progress,
        })
    }
}

fn parse_header(raw: &str) -> Result<(String, String), HeaderParseError> {
    let Some((key, value)) = raw.split_once(':') else {
        return Err(HeaderParseError(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(HeaderParseError(raw.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
