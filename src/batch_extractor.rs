// src/batch_extractor.rs

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cancel::CancellationFlag;
use crate::error::{EtlError, FailureReason, FetchError};
use crate::model::{RawPayload, Ticker};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::source::SourceClient;

/// Counters for a single batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ExtractionStats {
    fn record(&mut self, outcome: &ExtractionOutcome) {
        self.attempted += 1;
        match outcome {
            ExtractionOutcome::Success(_) => self.succeeded += 1,
            ExtractionOutcome::Failure(_) => self.failed += 1,
        }
    }

    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.succeeded == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Success(RawPayload),
    Failure(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickerFailure {
    pub ticker: Ticker,
    pub reason: FailureReason,
}

/// Result of one batch: one outcome per attempted ticker, in input order.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub outcomes: Vec<(Ticker, ExtractionOutcome)>,
    pub stats: ExtractionStats,
    pub cancelled: bool,
}

impl Extraction {
    pub fn payloads(&self) -> impl Iterator<Item = &RawPayload> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            ExtractionOutcome::Success(payload) => Some(payload),
            ExtractionOutcome::Failure(_) => None,
        })
    }

    pub fn failures(&self) -> Vec<TickerFailure> {
        self.outcomes
            .iter()
            .filter_map(|(ticker, outcome)| match outcome {
                ExtractionOutcome::Failure(reason) => Some(TickerFailure {
                    ticker: ticker.clone(),
                    reason: *reason,
                }),
                ExtractionOutcome::Success(_) => None,
            })
            .collect()
    }

    /// Splits the outcomes into successful payloads and failures, both still in input order.
    pub fn into_parts(self) -> (Vec<RawPayload>, Vec<TickerFailure>) {
        let mut payloads = Vec::new();
        let mut failures = Vec::new();
        for (ticker, outcome) in self.outcomes {
            match outcome {
                ExtractionOutcome::Success(payload) => payloads.push(payload),
                ExtractionOutcome::Failure(reason) => failures.push(TickerFailure { ticker, reason }),
            }
        }
        (payloads, failures)
    }
}

/// Runs a ticker list against one source, one ticker at a time.
///
/// A failing ticker is recorded and skipped; it never aborts the batch.
pub struct BatchExtractor {
    rate_limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cancel: CancellationFlag,
}

impl BatchExtractor {
    pub fn new(rate_limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        BatchExtractor {
            rate_limiter,
            retry,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    pub async fn extract(
        &self,
        tickers: &[Ticker],
        source: &dyn SourceClient,
        use_retry: bool,
    ) -> Result<Extraction, EtlError> {
        if tickers.is_empty() {
            return Err(EtlError::InvalidInput("ticker list is empty".into()));
        }

        let source_id = source.source_id();
        info!(source = source_id, tickers = tickers.len(), use_retry, "starting extraction");

        let mut stats = ExtractionStats::default();
        let mut outcomes = Vec::with_capacity(tickers.len());
        let mut cancelled = false;

        for ticker in tickers {
            if self.cancel.is_cancelled() {
                warn!(
                    source = source_id,
                    remaining = tickers.len() - stats.attempted,
                    "extraction cancelled"
                );
                cancelled = true;
                break;
            }

            let outcome = self.extract_one(ticker, source, use_retry).await;
            stats.record(&outcome);

            if let ExtractionOutcome::Success(_) = outcome {
                info!(source = source_id, %ticker, "extracted");
            }
            outcomes.push((ticker.clone(), outcome));
        }

        info!(
            source = source_id,
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "extraction finished"
        );

        Ok(Extraction {
            outcomes,
            stats,
            cancelled,
        })
    }

    async fn extract_one(
        &self,
        ticker: &Ticker,
        source: &dyn SourceClient,
        use_retry: bool,
    ) -> ExtractionOutcome {
        let source_id = source.source_id();
        let attempt = move || async move {
            self.rate_limiter.acquire(source_id).await;
            source.fetch(ticker).await
        };

        let result = if use_retry {
            self.retry.execute(attempt, &self.cancel).await.map_err(|error| {
                let reason = FailureReason::from(&error);
                warn!(
                    source = source_id,
                    %ticker,
                    attempts = error.attempts(),
                    %reason,
                    error = %error,
                    "ticker failed"
                );
                reason
            })
        } else {
            attempt().await.map_err(|error: FetchError| {
                let reason = error.reason();
                warn!(source = source_id, %ticker, %reason, error = %error, "ticker failed");
                reason
            })
        };

        match result {
            Ok(payload) => ExtractionOutcome::Success(payload),
            Err(reason) => ExtractionOutcome::Failure(reason),
        }
    }
}
