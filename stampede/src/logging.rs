use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "warn";
const FORMAT_VAR: &str = "STAMPEDE_LOG_FORMAT";

/// Installs the global subscriber on the first call, later calls are no-ops.
///
/// Filter comes from `RUST_LOG`, `STAMPEDE_LOG_FORMAT=json` switches to json lines.
/// Logs always go to stderr so stdout only ever carries the report.
pub fn init_tracing_once() {
    TRACING.get_or_init(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into());
        let fmt_json = std::env::var(FORMAT_VAR)
            .ok()
            .is_some_and(|v| v.eq_ignore_ascii_case("json"));
        let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true);
        let _ = if fmt_json {
            builder.json().try_init()
        } else {
            builder.compact().try_init()
        };
        tracing::debug!(json = fmt_json, "tracing initialized");
    });
}
