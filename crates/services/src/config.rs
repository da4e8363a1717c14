use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 45;
const DEFAULT_SUCCESS_GRACE_MS: u64 = 2_000;
const DEFAULT_FAILURE_GRACE_MS: u64 = 3_000;

fn parse_u64(key: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, raw: value }),
    }
}

/// Where and how to reach the analysis backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Read `ASSESS_API_BASE_URL`, `ASSESS_API_TOKEN` and `ASSESS_REQUEST_TIMEOUT_SECS`.
    ///
    /// Returns `Ok(None)` when no base URL is set, which disables remote calls.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(raw) = lookup("ASSESS_API_BASE_URL").filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        let base_url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl {
            key: "ASSESS_API_BASE_URL",
            raw: raw.clone(),
        })?;
        let api_token = lookup("ASSESS_API_TOKEN")
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        let timeout = parse_u64("ASSESS_REQUEST_TIMEOUT_SECS", lookup("ASSESS_REQUEST_TIMEOUT_SECS"))?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Some(Self {
            base_url,
            api_token,
            request_timeout: Duration::from_secs(timeout),
        }))
    }

    /// Join `path` onto the base URL, keeping any base path prefix.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Pacing for the submission pipeline.
///
/// The grace windows only delay automatic continuation after a submission is
/// finalized; they carry no correctness meaning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorPolicy {
    pub stage_timeout: Duration,
    pub success_grace: Duration,
    pub failure_grace: Duration,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
            success_grace: Duration::from_millis(DEFAULT_SUCCESS_GRACE_MS),
            failure_grace: Duration::from_millis(DEFAULT_FAILURE_GRACE_MS),
        }
    }
}

impl OrchestratorPolicy {
    /// Defaults overridden by `ASSESS_STAGE_TIMEOUT_SECS`, `ASSESS_GRACE_SUCCESS_MS`
    /// and `ASSESS_GRACE_FAILURE_MS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` for malformed values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut policy = Self::default();
        if let Some(secs) = parse_u64("ASSESS_STAGE_TIMEOUT_SECS", lookup("ASSESS_STAGE_TIMEOUT_SECS"))? {
            policy.stage_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64("ASSESS_GRACE_SUCCESS_MS", lookup("ASSESS_GRACE_SUCCESS_MS"))? {
            policy.success_grace = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64("ASSESS_GRACE_FAILURE_MS", lookup("ASSESS_GRACE_FAILURE_MS"))? {
            policy.failure_grace = Duration::from_millis(ms);
        }
        Ok(policy)
    }
}
