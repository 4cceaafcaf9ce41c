//! Client configuration.
//!
//! Defaults are embedded from `config/default.toml`. They can be
//! overridden by a TOML file named by `EMIS_CONFIG`, and each key can be
//! overridden again by its own environment variable:
//!
//! | Key | Variable |
//! |---|---|
//! | `base_url` | `EMIS_BASE_URL` |
//! | `timeout_secs` | `EMIS_TIMEOUT_SECS` |
//! | `max_retries` | `EMIS_MAX_RETRIES` |
//! | `retry_base_delay_ms` | `EMIS_RETRY_BASE_DELAY_MS` |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ApiError;
use crate::retry::RetryPolicy;

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_VAR: &str = "EMIS_CONFIG";

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

/// One layer of configuration. Every key is optional so layers can be
/// stacked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

impl ConfigLayer {
    fn parse(source: &str, toml_str: &str) -> Result<Self, ApiError> {
        toml::de::from_str(toml_str).map_err(|e| ApiError::Config {
            message: format!("failed to parse {source}: {e}"),
        })
    }

    fn from_env<F>(lookup: &F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            base_url: lookup("EMIS_BASE_URL"),
            timeout_secs: parse_var(lookup, "EMIS_TIMEOUT_SECS")?,
            max_retries: parse_var(lookup, "EMIS_MAX_RETRIES")?,
            retry_base_delay_ms: parse_var(lookup, "EMIS_RETRY_BASE_DELAY_MS")?,
        })
    }

    fn merge(self, over: Self) -> Self {
        Self {
            base_url: over.base_url.or(self.base_url),
            timeout_secs: over.timeout_secs.or(self.timeout_secs),
            max_retries: over.max_retries.or(self.max_retries),
            retry_base_delay_ms: over.retry_base_delay_ms.or(self.retry_base_delay_ms),
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ApiError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ApiError::Config {
                message: format!("{name}={raw:?} is invalid: {e}"),
            })
        })
        .transpose()
}

impl ApiConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the `EMIS_CONFIG` file cannot be
    /// read or parsed, a variable does not parse, or no base URL is
    /// configured.
    pub fn from_env() -> Result<Self, ApiError> {
        let lookup = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let file = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Some(read_file(Path::new(&path))?),
            None => None,
        };
        Self::resolve(file.as_deref(), lookup)
    }

    /// Resolves configuration from an optional TOML document and an
    /// environment lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] on parse failures or a missing base URL.
    pub fn resolve<F>(file_toml: Option<&str>, lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layer = ConfigLayer::parse("embedded defaults", DEFAULT_TOML)?;
        if let Some(file_toml) = file_toml {
            layer = layer.merge(ConfigLayer::parse(CONFIG_PATH_VAR, file_toml)?);
        }
        layer = layer.merge(ConfigLayer::from_env(&lookup)?);

        let base_url = layer
            .base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::Config {
                message: "no base URL configured (set EMIS_BASE_URL)".to_string(),
            })?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::Config {
                message: format!("base URL {base_url:?} must start with http:// or https://"),
            });
        }

        let defaults = RetryPolicy::default();
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(layer.timeout_secs.unwrap_or(30)),
            retry: RetryPolicy {
                max_retries: layer.max_retries.unwrap_or(defaults.max_retries),
                base_delay: layer
                    .retry_base_delay_ms
                    .map_or(defaults.base_delay, Duration::from_millis),
            },
        })
    }

    /// Configuration pointing at `base_url` with default timeout and retry
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if `base_url` is not an http(s) URL.
    pub fn for_base_url(base_url: &str) -> Result<Self, ApiError> {
        Self::resolve(None, |name: &str| {
            (name == "EMIS_BASE_URL").then(|| base_url.to_string())
        })
    }
}

fn read_file(path: &Path) -> Result<String, ApiError> {
    log::debug!("Reading client configuration from {}", path.display());
    std::fs::read_to_string(path).map_err(|e| ApiError::Config {
        message: format!("failed to read {}: {e}", path.display()),
    })
}
