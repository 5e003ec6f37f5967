//! Report renderers. Each one is a pure function of a [`Report`].
use crate::outcome::OutcomeCode;
use crate::report::{ErrorDetail, Report};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

const RULE: &str = "----------------------------------------";
const CSV_HEADER: &str = "Total Time (s),Total Requests,RPS,\
Min Duration (ms),Max Duration (ms),Avg Duration (ms),Errors";
const MAX_MESSAGE_WIDTH: usize = 50;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
    Csv,
}

pub fn render(report: &Report, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Plain => Ok(plain(report)),
        OutputFormat::Json => json(report),
        OutputFormat::Csv => Ok(csv(report)),
    }
}

#[must_use]
pub fn describe_status(code: u16) -> String {
    let known = match code {
        0 => "Unidentified Error",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        310 => "Too Many Redirects",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        495 => "SSL Certificate Error",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return format!("Status Code {code}"),
    };
    known.to_string()
}

#[inline]
#[allow(clippy::cast_precision_loss)]
fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_WIDTH {
        return message.to_string();
    }
    let mut short: String = message.chars().take(MAX_MESSAGE_WIDTH - 3).collect();
    short.push_str("...");
    short
}

// Writing into a String cannot fail, the fmt::Results below are discarded.

#[must_use]
pub fn plain(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n📊 Test Results Summary");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Total Time: {:.2} seconds", report.total_time.as_secs_f64());
    let _ = writeln!(out, "Total Requests: {}", report.total_requests);
    let _ = writeln!(out, "Requests per Second: {:.2}", report.rps);
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "⚡ Response Time Stats");
    let _ = writeln!(out, "{RULE}");
    match (report.min_duration, report.max_duration, report.avg_duration) {
        (Some(min), Some(max), Some(avg)) => {
            let _ = writeln!(out, "Minimum: {min:?}");
            let _ = writeln!(out, "Maximum: {max:?}");
            let _ = writeln!(out, "Average: {avg:?}");
            if let Some(sd) = report.std_deviation {
                let _ = writeln!(out, "Std Deviation: {sd:?}");
            }
            for (p, value) in report.percentiles() {
                if let Some(value) = value {
                    let _ = writeln!(out, "P{p}: {value:?}");
                }
            }
        }
        _ => {
            let _ = writeln!(out, "No successful requests to measure response time");
        }
    }
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "📈 Status Code Distribution");
    let _ = writeln!(out, "{RULE}");
    let codes = report.status_codes();
    let success = codes.get(&200).copied().unwrap_or(0);
    let _ = writeln!(
        out,
        "✅ Status 200 (Success): {success} requests ({:.1}%)",
        report.share(success)
    );
    for (code, count) in codes.iter().filter(|(code, _)| **code != 200) {
        let marker = match *code {
            0 | 400.. => "❌",
            300..=399 => "↪️",
            _ => "✅",
        };
        let _ = write!(
            out,
            "{marker} Status {code} ({}): {count} requests ({:.1}%)",
            describe_status(*code),
            report.share(*count)
        );
        let synthetic = report.count(OutcomeCode::Synthetic(*code));
        if synthetic > 0 {
            let _ = write!(out, ", {synthetic} from transport failures");
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "{RULE}");

    if report.errors > 0 {
        let _ = writeln!(
            out,
            "\n❌ Total Errors: {} ({:.1}%)",
            report.errors,
            report.share(report.errors)
        );
        let _ = writeln!(out, "\n❌ Error Details:");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(
            out,
            "| {:<8} | {:<50} | {:<8} | {:<10} |",
            "Status", "Error Message", "Count", "Percentage"
        );
        let _ = writeln!(out, "{RULE}");
        for detail in report.error_details_by_count() {
            let _ = writeln!(
                out,
                "| {:<8} | {:<50} | {:<8} | {:<9.1}% |",
                detail.code,
                truncate(&detail.message),
                detail.count,
                report.share(detail.count)
            );
        }
        let _ = writeln!(out, "{RULE}");
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    total_time_ms: f64,
    total_requests: usize,
    rps: f64,
    status_codes: BTreeMap<u16, usize>,
    synthetic_codes: BTreeMap<u16, usize>,
    errors: usize,
    min_duration_ms: Option<f64>,
    max_duration_ms: Option<f64>,
    avg_duration_ms: Option<f64>,
    std_deviation_ms: Option<f64>,
    percentiles_ms: BTreeMap<String, Option<f64>>,
    durations_ns: Vec<u64>,
    error_details: Vec<&'a ErrorDetail>,
}

pub fn json(report: &Report) -> Result<String, serde_json::Error> {
    let synthetic_codes = report
        .outcomes
        .iter()
        .filter(|(code, _)| code.is_synthetic())
        .map(|(code, count)| (code.as_u16(), *count))
        .collect();
    let view = JsonReport {
        total_time_ms: millis(report.total_time),
        total_requests: report.total_requests,
        rps: report.rps,
        status_codes: report.status_codes(),
        synthetic_codes,
        errors: report.errors,
        min_duration_ms: report.min_duration.map(millis),
        max_duration_ms: report.max_duration.map(millis),
        avg_duration_ms: report.avg_duration.map(millis),
        std_deviation_ms: report.std_deviation.map(millis),
        percentiles_ms: report
            .percentiles()
            .into_iter()
            .map(|(p, value)| (format!("p{p}"), value.map(millis)))
            .collect(),
        durations_ns: report
            .durations
            .iter()
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .collect(),
        error_details: report.error_details_by_count(),
    };
    serde_json::to_string_pretty(&view)
}

#[must_use]
pub fn csv(report: &Report) -> String {
    let cell = |d: Option<Duration>| d.map(|d| format!("{:.2}", millis(d))).unwrap_or_default();
    let mut out = String::new();
    let _ = writeln!(out, "{CSV_HEADER}");
    let _ = writeln!(
        out,
        "{:.2},{},{:.2},{},{},{},{}",
        report.total_time.as_secs_f64(),
        report.total_requests,
        report.rps,
        cell(report.min_duration),
        cell(report.max_duration),
        cell(report.avg_duration),
        report.errors
    );
    let _ = writeln!(out, "\nStatus Code Distribution");
    let _ = writeln!(out, "Code,Count,Percentage");
    for (code, count) in report.status_codes() {
        let _ = writeln!(out, "{code},{count},{:.2}", report.share(count));
    }
    out
}
