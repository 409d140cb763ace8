//! Per-operation timeouts from resource configuration

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tfplug::types::Diagnostics;
use tfplug::Context;
use tokio::time::Instant;

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)").ok())
        .as_ref()
}

/// Parse durations such as "90s", "5m", "1h30m" or "250ms"
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut total = 0.0_f64;
    let mut consumed = 0;

    for caps in duration_pattern()?.captures_iter(text) {
        let whole = caps.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();

        let value: f64 = caps[1].parse().ok()?;
        let seconds = match &caps[2] {
            "ns" => value / 1e9,
            "us" | "µs" => value / 1e6,
            "ms" => value / 1e3,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3600.0,
            _ => return None,
        };
        total += seconds;
    }

    if consumed != text.len() || !total.is_finite() {
        return None;
    }

    Duration::try_from_secs_f64(total).ok()
}

/// Derive a context for one CRUD operation.
///
/// An unset or empty `configured` value falls back to `default`. An unparsable
/// value is reported on `diags` and no context is returned.
pub fn handle_timeout(
    ctx: &Context,
    configured: Option<&str>,
    default: Duration,
    diags: &mut Diagnostics,
) -> Option<Context> {
    let configured = configured.map(str::trim).filter(|s| !s.is_empty());
    let timeout = match configured {
        None => Some(default),
        Some(text) => parse_duration(text),
    };

    let Some((timeout, deadline)) =
        timeout.and_then(|t| Instant::now().checked_add(t).map(|deadline| (t, deadline)))
    else {
        diags.add_error(
            "Invalid timeout",
            format!(
                "could not use timeout '{}': expected a duration like \"90s\" or \"5m\"",
                configured.unwrap_or_default()
            ),
        );
        return None;
    };

    tracing::debug!(timeout = ?timeout, "Using operation timeout");
    Some(ctx.with_deadline(deadline))
}
