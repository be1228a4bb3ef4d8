// src/error.rs

use polars::prelude::PolarsError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::retry::{RetryError, Retryable};

/// Failure of a single upstream fetch for one ticker.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The provider answered with a throttling notice instead of data.
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    pub fn reason(&self) -> FailureReason {
        match self {
            FetchError::Connection(_) => FailureReason::Connection,
            FetchError::Timeout(_) => FailureReason::Timeout,
            FetchError::HttpStatus { status: 429, .. } => FailureReason::RateLimitedExhausted,
            FetchError::HttpStatus { .. } => FailureReason::HttpStatus,
            FetchError::MalformedResponse(_) => FailureReason::MalformedResponse,
            FetchError::RateLimited(_) => FailureReason::RateLimitedExhausted,
            FetchError::UnknownTicker(_) => FailureReason::UnknownTicker,
            FetchError::Other(_) => FailureReason::Unknown,
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Connection(_) | FetchError::Timeout(_) | FetchError::RateLimited(_) => true,
            FetchError::HttpStatus { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            FetchError::MalformedResponse(_)
            | FetchError::UnknownTicker(_)
            | FetchError::Other(_) => false,
        }
    }
}

/// Why a ticker ended up without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    Connection,
    Timeout,
    HttpStatus,
    MalformedResponse,
    RateLimitedExhausted,
    UnknownTicker,
    Cancelled,
    Unknown,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Connection => "connection",
            FailureReason::Timeout => "timeout",
            FailureReason::HttpStatus => "http-status",
            FailureReason::MalformedResponse => "malformed-response",
            FailureReason::RateLimitedExhausted => "rate-limited-exhausted",
            FailureReason::UnknownTicker => "unknown-ticker",
            FailureReason::Cancelled => "cancelled",
            FailureReason::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&RetryError<FetchError>> for FailureReason {
    fn from(error: &RetryError<FetchError>) -> Self {
        match error {
            RetryError::Exhausted { source, .. } | RetryError::Permanent { source, .. } => {
                source.reason()
            }
            RetryError::Cancelled { .. } => FailureReason::Cancelled,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no payloads to transform")]
    EmptyInput,

    #[error("payloads contained no records")]
    NoRecords,

    #[error("payload {index} does not match the shape of the first payload (expected {expected})")]
    MixedShape { index: usize, expected: &'static str },

    #[error("payload {index} contains a non-object record")]
    NotARecord { index: usize },

    #[error("first record is missing required field `{field}`")]
    MissingField { field: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("cannot append an empty frame")]
    EmptyInput,

    #[error("destination table is required")]
    DestinationMissing,

    #[error("schema of `{destination}` does not match: expected [{expected}], got [{actual}]")]
    SchemaMismatch {
        destination: String,
        expected: String,
        actual: String,
    },

    #[error("warehouse backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Crate-level error for everything that is fatal to a call.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("load failed: {0}")]
    Load(#[from] WarehouseError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type EtlResult<T> = Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(FetchError::Timeout("slow".into()).is_retryable());
        assert!(FetchError::Connection("refused".into()).is_retryable());
        assert!(FetchError::HttpStatus { status: 503, body: String::new() }.is_retryable());
        assert!(FetchError::HttpStatus { status: 429, body: String::new() }.is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!FetchError::MalformedResponse("<html>".into()).is_retryable());
        assert!(!FetchError::UnknownTicker("ZZZZ".into()).is_retryable());
        assert!(!FetchError::HttpStatus { status: 402, body: String::new() }.is_retryable());
    }

    #[test]
    fn exhausted_throttle_maps_to_rate_limited_exhausted() {
        let error = RetryError::Exhausted {
            attempts: 3,
            source: FetchError::RateLimited("5 calls per minute".into()),
        };
        assert_eq!(FailureReason::from(&error), FailureReason::RateLimitedExhausted);

        let error = RetryError::Exhausted {
            attempts: 3,
            source: FetchError::Timeout("slow".into()),
        };
        assert_eq!(FailureReason::from(&error), FailureReason::Timeout);
    }

    #[test]
    fn reasons_render_kebab_case() {
        assert_eq!(FailureReason::MalformedResponse.to_string(), "malformed-response");
        assert_eq!(FailureReason::HttpStatus.as_str(), "http-status");
    }
}
