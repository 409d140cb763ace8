//! tracing subscriber setup
//!
//! Terraform captures provider stderr, so events are written there. The level
//! follows `TF_LOG_PROVIDER`, then `TF_LOG`, then defaults to INFO.

use tracing_subscriber::EnvFilter;

/// Log level for provider output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Terraform level names; anything unrecognised (including "JSON") is None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        ["TF_LOG_PROVIDER", "TF_LOG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find_map(|value| Self::parse(&value))
            .unwrap_or(LogLevel::Info)
    }

    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    init_with_level(LogLevel::from_env());
}

pub fn init_with_level(level: LogLevel) {
    let filter = EnvFilter::new(level.as_directive());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parses_terraform_levels() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" WARN "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("JSON"), None);
        assert_eq!(LogLevel::parse(""), None);
    }

    #[test]
    #[serial]
    fn provider_level_takes_precedence() {
        std::env::set_var("TF_LOG", "ERROR");
        std::env::set_var("TF_LOG_PROVIDER", "TRACE");
        assert_eq!(LogLevel::from_env(), LogLevel::Trace);

        std::env::remove_var("TF_LOG_PROVIDER");
        assert_eq!(LogLevel::from_env(), LogLevel::Error);

        std::env::remove_var("TF_LOG");
        assert_eq!(LogLevel::from_env(), LogLevel::Info);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_with_level(LogLevel::Debug);
        init_with_level(LogLevel::Info);
    }
}
