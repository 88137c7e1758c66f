// Logging setup, mirroring the reference daemon's `setup_logger`: a single
// `tracing_subscriber::fmt` subscriber driven by `RUST_LOG`, defaulting to
// `info`. Library code never prints directly; only binaries/tests do.

use chrono::{TimeZone, Utc};
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a global `tracing` subscriber. Safe to call more than once;
/// subsequent calls are no-ops (the underlying `set_global_default` error is
/// swallowed, matching how reference entry points tolerate double-init under
/// `#[test]`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Renders an epoch-second timestamp (a block's `date()`/`claimed_time()`,
/// or a bootstrap session's expiry) as RFC 3339 for log lines, rather than
/// leaving operators to puzzle out raw epoch seconds.
pub fn human_time(epoch_secs: i64) -> String {
    match Utc.timestamp_opt(epoch_secs, 0).single() {
        Some(dt) => dt.to_rfc3339(),
        None => format!("<invalid timestamp {epoch_secs}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_time_renders_rfc3339() {
        assert_eq!(human_time(0), "1970-01-01T00:00:00+00:00");
    }
}
