//! Dashboard configuration from environment variables

use crate::acquisition::controller::RetryPolicy;
use crate::analytics::detector::DEFAULT_SIGMA;
use crate::analytics::ranking::DEFAULT_RANKING_LIMIT;
use crate::engine::EngineSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loaded from environment variables
///
/// Every field has a default so a bare `.env`-less run talks to a local backend.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the transaction service (without trailing `/transactions`)
    pub api_url: String,

    pub user_id: String,

    /// Bearer token issued by the auth service, if any
    pub api_token: Option<String>,

    /// Page size requested in the single fetch; the backend caps this at 500
    pub page_size: u32,

    /// Retries after the first empty/failed response
    pub max_retries: u32,

    pub retry_delay_ms: u64,

    pub request_timeout_secs: u64,

    pub ranking_limit: usize,

    pub merchant_limit: usize,

    pub anomaly_sigma: f64,

    /// Read transactions from a JSON file instead of the HTTP service
    pub source_file: Option<String>,

    /// Print the view bundle as JSON once acquisition settles, no TUI
    pub headless: bool,

    pub rust_log: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SPENDLENS_API_URL` (default: http://localhost:8000/api)
    /// - `SPENDLENS_USER_ID` (default: demo_user)
    /// - `SPENDLENS_API_TOKEN` (optional)
    /// - `SPENDLENS_PAGE_SIZE` (default: 500)
    /// - `SPENDLENS_MAX_RETRIES` (default: 5)
    /// - `SPENDLENS_RETRY_DELAY_MS` (default: 3000)
    /// - `SPENDLENS_REQUEST_TIMEOUT_SECS` (default: 10)
    /// - `SPENDLENS_RANKING_LIMIT` (default: 10)
    /// - `SPENDLENS_MERCHANT_LIMIT` (default: 10)
    /// - `SPENDLENS_ANOMALY_SIGMA` (default: 3.0)
    /// - `SPENDLENS_SOURCE_FILE` (optional)
    /// - `SPENDLENS_HEADLESS` (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        Self {
            api_url: non_empty("SPENDLENS_API_URL")
                .unwrap_or_else(|| "http://localhost:8000/api".to_string()),

            user_id: non_empty("SPENDLENS_USER_ID").unwrap_or_else(|| "demo_user".to_string()),

            api_token: non_empty("SPENDLENS_API_TOKEN"),

            page_size: parse_var(&lookup, "SPENDLENS_PAGE_SIZE").unwrap_or(500),

            max_retries: parse_var(&lookup, "SPENDLENS_MAX_RETRIES").unwrap_or(5),

            retry_delay_ms: parse_var(&lookup, "SPENDLENS_RETRY_DELAY_MS").unwrap_or(3_000),

            request_timeout_secs: parse_var(&lookup, "SPENDLENS_REQUEST_TIMEOUT_SECS")
                .unwrap_or(10),

            ranking_limit: parse_var(&lookup, "SPENDLENS_RANKING_LIMIT")
                .unwrap_or(DEFAULT_RANKING_LIMIT),

            merchant_limit: parse_var(&lookup, "SPENDLENS_MERCHANT_LIMIT").unwrap_or(10),

            anomaly_sigma: parse_var::<f64, _>(&lookup, "SPENDLENS_ANOMALY_SIGMA")
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(DEFAULT_SIGMA),

            source_file: non_empty("SPENDLENS_SOURCE_FILE"),

            headless: parse_var(&lookup, "SPENDLENS_HEADLESS").unwrap_or(false),

            rust_log: lookup("RUST_LOG"),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            ranking_limit: self.ranking_limit,
            merchant_limit: self.merchant_limit,
            anomaly_sigma: self.anomaly_sigma,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}
