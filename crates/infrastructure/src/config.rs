//! Client configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use aisle_application::{ClientOptions, DEFAULT_BASE_URL, DEFAULT_REFRESH_TIMEOUT};
use thiserror::Error;
use url::Url;

use crate::adapters::DEFAULT_REQUEST_TIMEOUT;
use crate::persistence::FileTokenStorage;

/// API base URL.
pub const ENV_API_URL: &str = "AISLE_API_URL";
/// Refresh exchange bound, in milliseconds.
pub const ENV_REFRESH_TIMEOUT_MS: &str = "AISLE_REFRESH_TIMEOUT_MS";
/// Per-request transport timeout, in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "AISLE_REQUEST_TIMEOUT_MS";
/// Token file path.
pub const ENV_TOKEN_FILE: &str = "AISLE_TOKEN_FILE";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The base URL is not an absolute http(s) URL.
    #[error("{var} is not a valid http(s) URL: {value}")]
    InvalidUrl {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A numeric setting did not parse.
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// API base URL without trailing slash.
    pub base_url: String,
    /// Bound on the refresh exchange.
    pub refresh_timeout: Duration,
    /// Per-request transport timeout.
    pub request_timeout: Duration,
    /// Token file; `None` keeps tokens in memory only.
    pub token_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token_file: FileTokenStorage::default_path(),
        }
    }
}

impl ApiConfig {
    /// Reads the `AISLE_*` variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolves configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a looked-up value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let lookup = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let base_url = match lookup(ENV_API_URL) {
            Some(value) => parse_base_url(ENV_API_URL, &value)?,
            None => defaults.base_url,
        };
        let refresh_timeout = match lookup(ENV_REFRESH_TIMEOUT_MS) {
            Some(value) => parse_millis(ENV_REFRESH_TIMEOUT_MS, &value)?,
            None => defaults.refresh_timeout,
        };
        let request_timeout = match lookup(ENV_REQUEST_TIMEOUT_MS) {
            Some(value) => parse_millis(ENV_REQUEST_TIMEOUT_MS, &value)?,
            None => defaults.request_timeout,
        };
        let token_file = lookup(ENV_TOKEN_FILE)
            .map(PathBuf::from)
            .or(defaults.token_file);

        Ok(Self {
            base_url,
            refresh_timeout,
            request_timeout,
            token_file,
        })
    }

    /// Overrides the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not an http(s) URL.
    pub fn set_base_url(&mut self, value: &str) -> Result<(), ConfigError> {
        self.base_url = parse_base_url(ENV_API_URL, value)?;
        Ok(())
    }

    /// Returns the options for `ApiClient::new`.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            refresh_timeout: self.refresh_timeout,
        }
    }
}

fn parse_base_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000/api");
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://wedding.example.com/api/"),
            (ENV_REFRESH_TIMEOUT_MS, "2500"),
            (ENV_TOKEN_FILE, "/tmp/aisle/tokens.json"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://wedding.example.com/api");
        assert_eq!(config.refresh_timeout, Duration::from_millis(2500));
        assert_eq!(
            config.token_file,
            Some(PathBuf::from("/tmp/aisle/tokens.json"))
        );
        assert_eq!(
            config.client_options().base_url,
            "https://wedding.example.com/api"
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[(ENV_API_URL, "ftp://example.com")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_MS, "0")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[(ENV_REFRESH_TIMEOUT_MS, "soon")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }
}
