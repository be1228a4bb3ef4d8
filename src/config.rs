// src/config.rs

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::EtlError;
use crate::rate_limiter::Quota;
use crate::retry::RetryPolicy;
use crate::session::HttpSession;

pub const DEFAULT_ALPHA_API_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_FMP_API_URL: &str = "https://financialmodelingprep.com/api/v3/historical-price-full";
pub const DEFAULT_DESTINATION: &str = "raw_stock_price";
pub const DEFAULT_WAREHOUSE_DIR: &str = "warehouse";

/// Base URL and key for one upstream API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub alpha: Option<ApiConfig>,
    pub fmp: Option<ApiConfig>,
    pub ticker_csv: Option<PathBuf>,
    pub destination: String,
    pub warehouse_dir: PathBuf,
    pub retry: RetryPolicy,
    pub quota: Quota,
    pub http_timeout: Duration,
}

impl EtlConfig {
    /// Reads the process environment after loading `.env` if present.
    pub fn from_env() -> Result<Self, EtlError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api = |url_key: &str, key_key: &str, default_url: &str| {
            var(key_key).map(|api_key| ApiConfig {
                base_url: var(url_key).unwrap_or_else(|| default_url.to_string()),
                api_key,
            })
        };

        let max_retries = parse_var(&var, "ETL_MAX_RETRIES", RetryPolicy::DEFAULT_MAX_RETRIES)?;
        let retry_delay = parse_var(
            &var,
            "ETL_RETRY_DELAY_SECS",
            RetryPolicy::DEFAULT_RETRY_DELAY.as_secs_f64(),
        )?;
        let max_calls = parse_var(&var, "ETL_MAX_CALLS", Quota::DEFAULT_MAX_CALLS)?;
        let window = parse_var(&var, "ETL_WINDOW_SECS", Quota::DEFAULT_WINDOW.as_secs_f64())?;
        let http_timeout = parse_var(
            &var,
            "ETL_HTTP_TIMEOUT_SECS",
            HttpSession::DEFAULT_TIMEOUT.as_secs_f64(),
        )?;

        Ok(EtlConfig {
            alpha: api("ALPHA_API_URL", "ALPHA_API_KEY", DEFAULT_ALPHA_API_URL),
            fmp: api("FMP_API_URL", "FMP_API_KEY", DEFAULT_FMP_API_URL),
            ticker_csv: var("TICKER_CSV").map(PathBuf::from),
            destination: var("ETL_DESTINATION").unwrap_or_else(|| DEFAULT_DESTINATION.to_string()),
            warehouse_dir: var("ETL_WAREHOUSE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WAREHOUSE_DIR)),
            retry: RetryPolicy::new(max_retries, seconds("ETL_RETRY_DELAY_SECS", retry_delay)?)?,
            quota: Quota::new(max_calls, seconds("ETL_WINDOW_SECS", window)?)?,
            http_timeout: seconds("ETL_HTTP_TIMEOUT_SECS", http_timeout)?,
        })
    }

    pub fn alpha(&self) -> Result<&ApiConfig, EtlError> {
        self.alpha
            .as_ref()
            .ok_or_else(|| EtlError::Config("ALPHA_API_KEY is not set".into()))
    }

    pub fn fmp(&self) -> Result<&ApiConfig, EtlError> {
        self.fmp
            .as_ref()
            .ok_or_else(|| EtlError::Config("FMP_API_KEY is not set".into()))
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T, EtlError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| EtlError::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration, EtlError> {
    Duration::try_from_secs_f64(value).map_err(|e| EtlError::Config(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = EtlConfig::from_lookup(lookup(&[])).unwrap();

        assert!(config.alpha.is_none());
        assert!(config.fmp.is_none());
        assert_eq!(config.destination, DEFAULT_DESTINATION);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.quota, Quota::default());
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(matches!(config.alpha(), Err(EtlError::Config(_))));
    }

    #[test]
    fn api_sections_require_a_key() {
        let config = EtlConfig::from_lookup(lookup(&[
            ("ALPHA_API_KEY", "demo"),
            ("FMP_API_URL", "https://example.test/fmp"),
            ("ETL_MAX_RETRIES", "2"),
            ("ETL_RETRY_DELAY_SECS", "0.5"),
            ("ETL_WINDOW_SECS", "1"),
        ]))
        .unwrap();

        let alpha = config.alpha().unwrap();
        assert_eq!(alpha.base_url, DEFAULT_ALPHA_API_URL);
        assert_eq!(alpha.api_key, "demo");
        assert!(config.fmp.is_none());
        assert_eq!(config.retry.max_retries(), 2);
        assert_eq!(config.retry.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.quota.window(), Duration::from_secs(1));
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let error = EtlConfig::from_lookup(lookup(&[("ETL_MAX_CALLS", "many")])).unwrap_err();
        assert!(matches!(error, EtlError::Config(_)));

        let error = EtlConfig::from_lookup(lookup(&[("ETL_WINDOW_SECS", "-3")])).unwrap_err();
        assert!(matches!(error, EtlError::Config(_)));

        let error = EtlConfig::from_lookup(lookup(&[("ETL_MAX_RETRIES", "0")])).unwrap_err();
        assert!(matches!(error, EtlError::InvalidInput(_)));
    }
}
