//! Configuration management
//!
//! Optional `settings.json` in the addrscan directory:
//! ```json
//! {
//!   "baseUrl": "https://api.bybit.com",
//!   "recvWindowMs": 5000,
//!   "timeoutSecs": 15,
//!   "workers": 1,
//!   "includeDisabled": false,
//!   "rateLimit": { "requestsPerSecond": 5, "burst": 5 },
//!   "retry": { "maxAttempts": 8, "baseDelayMs": 800, "maxDelayMs": 8000 }
//! }
//! ```
//! Every field is optional. `ADDRSCAN_BASE_URL` and `ADDRSCAN_WORKERS`
//! override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::domain::credential::parse_key_values;
use crate::domain::Credential;
use crate::services::{RateLimit, RetryPolicy, MIN_REQUESTS_PER_SECOND};

pub const BASE_URL_ENV: &str = "ADDRSCAN_BASE_URL";
pub const WORKERS_ENV: &str = "ADDRSCAN_WORKERS";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    recv_window_ms: Option<u64>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    workers: Option<usize>,
    #[serde(default)]
    include_disabled: Option<bool>,
    #[serde(default)]
    rate_limit: Option<RateLimitSettings>,
    #[serde(default)]
    retry: Option<RetrySettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitSettings {
    #[serde(default)]
    requests_per_second: Option<f64>,
    #[serde(default)]
    burst: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrySettings {
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    base_delay_ms: Option<u64>,
    #[serde(default)]
    max_delay_ms: Option<u64>,
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Overrides the exchange's default base URL
    pub base_url: Option<String>,
    pub recv_window_ms: u64,
    pub timeout: Duration,
    pub workers: usize,
    pub include_disabled: bool,
    pub rate_limit: RateLimit,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            recv_window_ms: 5000,
            timeout: Duration::from_secs(15),
            workers: 1,
            include_disabled: false,
            rate_limit: RateLimit::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load config from the addrscan directory, then apply env overrides
    pub fn load(dir: &Path) -> Result<Self> {
        Self::load_with_env(dir, |name| std::env::var(name).ok())
    }

    /// Load with an explicit environment lookup
    pub fn load_with_env(dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settings_path = dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::default()
            .merged(raw)
            .with_context(|| format!("Invalid settings in {}", settings_path.display()))?;

        if let Some(url) = env(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = Some(url.trim().to_string());
        }
        if let Some(workers) = env(WORKERS_ENV) {
            config.workers = workers
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number, got '{}'", WORKERS_ENV, workers))?;
        }

        Ok(config)
    }

    fn merged(mut self, raw: SettingsFile) -> Result<Self> {
        if let Some(url) = raw.base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = Some(url);
        }
        if let Some(ms) = raw.recv_window_ms {
            self.recv_window_ms = ms;
        }
        if let Some(secs) = raw.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = raw.workers {
            self.workers = workers;
        }
        if let Some(include) = raw.include_disabled {
            self.include_disabled = include;
        }
        if let Some(limit) = raw.rate_limit {
            if let Some(rps) = limit.requests_per_second {
                if !rps.is_finite() {
                    bail!("rateLimit.requestsPerSecond must be a finite number, got {}", rps);
                }
                if rps > 0.0 && rps < MIN_REQUESTS_PER_SECOND {
                    tracing::warn!(
                        requested = rps,
                        min = MIN_REQUESTS_PER_SECOND,
                        "Request rate too low, using the minimum"
                    );
                }
                self.rate_limit.requests_per_second = rps;
                self.rate_limit = self.rate_limit.clamped();
            }
            if let Some(burst) = limit.burst {
                self.rate_limit.burst = burst;
            }
        }
        if let Some(retry) = raw.retry {
            if let Some(attempts) = retry.max_attempts {
                self.retry.max_attempts = attempts.max(1);
            }
            if let Some(ms) = retry.base_delay_ms {
                self.retry.base_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = retry.max_delay_ms {
                self.retry.max_delay = Duration::from_millis(ms);
            }
        }
        Ok(self)
    }
}

/// Read a `KEY=VALUE` credentials file for one exchange
pub fn load_credentials(path: &Path, exchange: &str) -> Result<Credential> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    let values = parse_key_values(&content);
    Ok(Credential::from_key_values(&values, exchange)?)
}
