/// Application configuration
///
/// The backend address and request timeout are read once at startup and
/// passed explicitly to the API client. Nothing else is configurable; all
/// other state lives in memory for the session.

use std::env;
use std::time::Duration;

/// Default backend address for local development
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default per-request timeout in seconds.
/// Segmentation is expensive; give the backend plenty of room before
/// declaring a file failed. Timed-out requests are never retried.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Runtime configuration for the backend connection
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the segmentation backend, without a trailing slash
    pub api_base_url: String,
    /// Per-request timeout applied to every backend call
    pub request_timeout: Duration,
}

impl Config {
    /// Build the configuration from the process environment.
    ///
    /// - `CELL_ANNOTATOR_API_URL` selects the backend address
    /// - `CELL_ANNOTATOR_TIMEOUT_SECS` selects the request timeout
    ///
    /// Unset or unparseable values fall back to the local defaults.
    pub fn from_env() -> Self {
        Self::from_values(
            env::var("CELL_ANNOTATOR_API_URL").ok(),
            env::var("CELL_ANNOTATOR_TIMEOUT_SECS").ok(),
        )
    }

    fn from_values(api_url: Option<String>, timeout_secs: Option<String>) -> Self {
        let api_base_url = api_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout = match timeout_secs.as_deref().map(str::parse::<u64>) {
            Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
            Some(_) => {
                log::warn!(
                    "Ignoring invalid CELL_ANNOTATOR_TIMEOUT_SECS={:?}, using {}s",
                    timeout_secs,
                    DEFAULT_TIMEOUT_SECS
                );
                Duration::from_secs(DEFAULT_TIMEOUT_SECS)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Config {
            api_base_url,
            request_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_values(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_values(None, None);
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_values(
            Some("http://segmenter.lab:9000".to_string()),
            Some("30".to_string()),
        );
        assert_eq!(config.api_base_url, "http://segmenter.lab:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let config = Config::from_values(Some("http://localhost:8000/".to_string()), None);
        assert_eq!(config.api_base_url, "http://localhost:8000");
    }

    #[test]
    fn test_bad_timeout_falls_back() {
        let config = Config::from_values(None, Some("soon".to_string()));
        assert_eq!(config.request_timeout, Duration::from_secs(120));

        let config = Config::from_values(None, Some("0".to_string()));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }
}
