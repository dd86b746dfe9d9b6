//! Structured logging configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter when nothing else is configured.
pub const DEFAULT_FILTER: &str = "rolegrid=info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything other than `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive, in `EnvFilter` syntax.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional file to append to instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds the subscriber filter.
    ///
    /// `ROLEGRID_LOG` wins, then `RUST_LOG`, then `verbose` (debug for this
    /// crate), then the configured level.
    #[must_use]
    pub fn filter(&self, verbose: bool) -> EnvFilter {
        let directive = env_directive()
            .or_else(|| verbose.then(|| "rolegrid=debug".to_string()))
            .unwrap_or_else(|| self.level.clone());
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    /// Applies `ROLEGRID_LOG_FORMAT` and `ROLEGRID_LOG_FILE` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(format) = std::env::var("ROLEGRID_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Ok(file) = std::env::var("ROLEGRID_LOG_FILE") {
            if !file.trim().is_empty() {
                self.file = Some(PathBuf::from(file));
            }
        }
        self
    }
}

fn env_directive() -> Option<String> {
    ["ROLEGRID_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", LogFormat::Json; "json")]
    #[test_case(" JSON ", LogFormat::Json; "json mixed case")]
    #[test_case("pretty", LogFormat::Pretty; "pretty")]
    #[test_case("text", LogFormat::Pretty; "unknown falls back")]
    fn test_log_format_parse(input: &str, expected: LogFormat) {
        assert_eq!(LogFormat::parse(input), expected);
    }

    #[test]
    fn test_default_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_FILTER);
        assert!(config.file.is_none());
    }
}
