//! Structured logging setup.
//!
//! Logs go to stderr so the run report on stdout stays machine-readable.
//! Level sources, strongest first: `RUST_LOG` directives, `-v` flags,
//! `CSROLL_LOG_LEVEL`, the `[log]` config section, then `warn`.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for csroll's own events.
    pub level: Level,
    /// Emit one JSON object per event.
    pub use_json: bool,
    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            use_json: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Build from the environment, the config file and the verbosity count.
    pub fn resolve(config_level: Option<&str>, config_json: bool, verbose: u8) -> Self {
        let env_level = env::var("CSROLL_LOG_LEVEL").ok();
        let base = env_level
            .as_deref()
            .or(config_level)
            .and_then(parse_level)
            .unwrap_or(Level::WARN);
        let level = match verbose {
            0 => base,
            1 => base.max(Level::INFO),
            2 => base.max(Level::DEBUG),
            _ => Level::TRACE,
        };
        let use_json = env::var("CSROLL_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(config_json);
        Self {
            level,
            use_json,
            include_location: level >= Level::TRACE,
        }
    }
}

/// Parse a level name, case-insensitively.
pub fn parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = format!("csroll={}", config.level).parse::<Directive>() {
            filter = filter.add_directive(directive);
        }

        if config.use_json {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Some(Level::TRACE));
        assert_eq!(parse_level("Debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" warning "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_verbosity_raises_level() {
        // CSROLL_LOG_LEVEL is not set in the test environment
        if env::var_os("CSROLL_LOG_LEVEL").is_some() {
            return;
        }
        assert_eq!(LoggingConfig::resolve(None, false, 0).level, Level::WARN);
        assert_eq!(LoggingConfig::resolve(None, false, 1).level, Level::INFO);
        assert_eq!(LoggingConfig::resolve(Some("error"), false, 2).level, Level::DEBUG);
        assert_eq!(LoggingConfig::resolve(Some("debug"), false, 1).level, Level::DEBUG);
        assert_eq!(LoggingConfig::resolve(None, false, 5).level, Level::TRACE);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.use_json);
        assert_eq!(LoggingConfig::with_level(Level::INFO).level, Level::INFO);
    }
}
