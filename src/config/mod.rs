//! Configuration management.
//!
//! Values are resolved in order: defaults, then a TOML file, then
//! `ROLEGRID_*` environment variables.
//!
//! ```toml
//! api_url = "https://rbac.example.com/api"
//! token = "..."
//! timeout_ms = 30000
//! page_size = 100
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! file = "/var/log/rolegrid.log"
//! ```

use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for the console.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the RBAC service.
    pub api_url: Option<String>,
    /// Bearer token for the RBAC service.
    pub token: Option<SecretString>,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
    /// Permissions requested per page when listing.
    pub page_size: u32,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
            page_size: 100,
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Service base URL.
    pub api_url: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// List page size.
    pub page_size: Option<u32>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive, e.g. `debug` or `rolegrid=trace`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl ConsoleConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(file).with_env_overrides())
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `ROLEGRID_CONFIG_PATH`, then the platform config dir
    /// (`<config_dir>/rolegrid/config.toml`). Falls back to defaults when no
    /// file exists. Env overrides are applied in every case.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var("ROLEGRID_CONFIG_PATH") {
            if !path.trim().is_empty() {
                return Self::load_from_file(Path::new(&path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default().with_env_overrides())
    }

    /// Converts a `ConfigFile` to `ConsoleConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        config.api_url = file.api_url;
        config.token = file.token.map(SecretString::from);
        if let Some(v) = file.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = file.connect_timeout_ms {
            config.connect_timeout_ms = v;
        }
        if let Some(v) = file.page_size {
            config.page_size = v;
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config
    }

    /// Applies `ROLEGRID_*` environment variable overrides.
    ///
    /// Unparseable numeric values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = non_empty_env("ROLEGRID_API_URL") {
            self.api_url = Some(v);
        }
        if let Some(v) = non_empty_env("ROLEGRID_TOKEN") {
            self.token = Some(SecretString::from(v));
        }
        if let Some(v) = non_empty_env("ROLEGRID_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.timeout_ms = v;
        }
        if let Some(v) =
            non_empty_env("ROLEGRID_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = non_empty_env("ROLEGRID_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.page_size = v;
        }
        self.logging = self.logging.with_env_overrides();
        self
    }

    /// Sets the API URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Checks that the service can be reached with these settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a missing or non-http(s) URL, a
    /// missing token, or a zero page size.
    pub fn validate(&self) -> Result<()> {
        let url = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::InvalidInput("api_url is required".to_string()))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "api_url must start with http:// or https://, got '{url}'"
            )));
        }
        if self.token.is_none() {
            return Err(Error::InvalidInput("token is required".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidInput(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform config file location, if a home directory can be resolved.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("rolegrid").join("config.toml"))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert!(config.api_url.is_none());
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_from_config_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            api_url = "https://rbac.example.com"
            token = "secret"
            page_size = 25

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        let config = ConsoleConfig::from_config_file(file);
        assert_eq!(config.api_url.as_deref(), Some("https://rbac.example.com"));
        assert_eq!(config.token.as_ref().unwrap().expose_secret(), "secret");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = \"http://localhost:8080\"").unwrap();
        writeln!(file, "timeout_ms = 500").unwrap();

        let config = ConsoleConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.timeout_ms, 500);
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = ConsoleConfig::load_from_file(Path::new("/nonexistent/rolegrid.toml"));
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size = \"many\"").unwrap();
        let result = ConsoleConfig::load_from_file(file.path());
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_validate() {
        let valid = ConsoleConfig::new()
            .with_api_url("https://rbac.example.com")
            .with_token("t");
        assert!(valid.validate().is_ok());

        let no_url = ConsoleConfig::new().with_token("t");
        assert!(no_url.validate().is_err());

        let no_token = ConsoleConfig::new().with_api_url("https://rbac.example.com");
        assert!(no_token.validate().is_err());

        let bad_scheme = ConsoleConfig::new()
            .with_api_url("ftp://rbac.example.com")
            .with_token("t");
        assert!(bad_scheme.validate().is_err());

        let mut zero_page = valid;
        zero_page.page_size = 0;
        assert!(zero_page.validate().is_err());
    }
}
