use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{ReportError, Result};

pub const DEFAULT_API_URL: &str = "https://api.snyk.io/rest";
pub const DEFAULT_API_VERSION: &str = "2024-10-15";
pub const DEFAULT_THRESHOLD_DAYS: u32 = 30;

/// Attempt cap and backoff base for the HTTP retry wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

/// Fixed interval and poll cap for export jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    /// Upper bound on the time spent polling one export job.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_polls
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_polls: 60,
        }
    }
}

/// Run configuration, built once and handed to every component.
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub org_id: String,
    pub threshold_days: u32,
    pub api_url: String,
    pub api_version: String,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
}

impl Config {
    pub fn new(token: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            org_id: org_id.into(),
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }

    /// Load from the process environment, reading `.env` (or `env_file`) first.
    /// Values already set in the environment win over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    ReportError::Config(format!("failed to load {}: {e}", path.display()))
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ReportError::Config(format!("{key} is not set")))
        };

        let mut cfg = Self::new(required("SNYK_TOKEN")?, required("SNYK_ORG_ID")?);

        if let Some(raw) = lookup("COMPLIANCE_THRESHOLD_DAYS") {
            let raw = raw.trim();
            if !raw.is_empty() {
                cfg.threshold_days = raw.parse().map_err(|e| {
                    ReportError::Config(format!(
                        "COMPLIANCE_THRESHOLD_DAYS must be a non-negative integer, got {raw:?}: {e}"
                    ))
                })?;
            }
        }
        if let Some(url) = lookup("SNYK_API_URL").filter(|v| !v.trim().is_empty()) {
            cfg.api_url = url.trim().trim_end_matches('/').to_string();
        }

        Ok(cfg)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("org_id", &self.org_id)
            .field("threshold_days", &self.threshold_days)
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("retry", &self.retry)
            .field("poll", &self.poll)
            .finish()
    }
}
