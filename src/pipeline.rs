// src/pipeline.rs

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::alpha_vantage::{AlphaFunction, AlphaVantageClient};
use crate::batch_extractor::{BatchExtractor, ExtractionStats, TickerFailure};
use crate::config::EtlConfig;
use crate::error::EtlError;
use crate::fmp::{FmpClient, FmpSeries};
use crate::loader::Loader;
use crate::model::{Destination, Ticker};
use crate::rate_limiter::RateLimiter;
use crate::session::HttpSession;
use crate::source::SourceClient;
use crate::transformer::Transformer;
use crate::warehouse::Warehouse;
use crate::{alpha_vantage, fmp};

/// Upstream dataset a run pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    AlphaQuote,
    AlphaDaily,
    FmpYearly,
    FmpFiveYear,
}

impl SourceKind {
    pub fn build(&self, config: &EtlConfig, session: HttpSession) -> Result<Box<dyn SourceClient>, EtlError> {
        let client: Box<dyn SourceClient> = match self {
            SourceKind::AlphaQuote => Box::new(AlphaVantageClient::new(
                session,
                config.alpha()?.clone(),
                AlphaFunction::GlobalQuote,
            )),
            SourceKind::AlphaDaily => Box::new(AlphaVantageClient::new(
                session,
                config.alpha()?.clone(),
                AlphaFunction::TimeSeriesDaily,
            )),
            SourceKind::FmpYearly => Box::new(FmpClient::new(
                session,
                config.fmp()?.clone(),
                FmpSeries::Yearly,
            )),
            SourceKind::FmpFiveYear => Box::new(FmpClient::new(
                session,
                config.fmp()?.clone(),
                FmpSeries::FiveYear,
            )),
        };
        Ok(client)
    }
}

/// Rate limiter with the configured quota registered for every known source.
pub fn configured_rate_limiter(config: &EtlConfig) -> RateLimiter {
    RateLimiter::new()
        .with_quota(alpha_vantage::SOURCE_ID, config.quota)
        .with_quota(fmp::SOURCE_ID, config.quota)
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub stats: ExtractionStats,
    pub failures: Vec<TickerFailure>,
    pub rows_loaded: usize,
    pub rejected_rows: usize,
    pub cancelled: bool,
}

/// Extract, transform and load for one ticker list and one source.
pub struct EtlPipeline {
    extractor: BatchExtractor,
    transformer: Transformer,
    loader: Loader,
}

impl EtlPipeline {
    pub fn new(extractor: BatchExtractor, transformer: Transformer, loader: Loader) -> Self {
        EtlPipeline {
            extractor,
            transformer,
            loader,
        }
    }

    pub fn extractor(&self) -> &BatchExtractor {
        &self.extractor
    }

    pub async fn run(
        &self,
        tickers: &[Ticker],
        source: &dyn SourceClient,
        destination: &Destination,
        use_retry: bool,
    ) -> Result<PipelineReport, EtlError> {
        let extraction = self.extractor.extract(tickers, source, use_retry).await?;

        let stats = extraction.stats;
        let cancelled = extraction.cancelled;
        let (payloads, failures) = extraction.into_parts();

        let mut report = PipelineReport {
            stats,
            failures,
            rows_loaded: 0,
            rejected_rows: 0,
            cancelled,
        };

        if payloads.is_empty() {
            warn!(
                source = source.source_id(),
                attempted = report.stats.attempted,
                "no payloads extracted, nothing to load"
            );
            return Ok(report);
        }

        let records = self.transformer.transform(&payloads)?;
        report.rejected_rows = records.rejected_rows;

        if records.is_empty() {
            warn!(rejected = records.rejected_rows, "every row was rejected, nothing to load");
            return Ok(report);
        }

        report.rows_loaded = self.loader.load(&records, destination).await?;
        info!(
            %destination,
            rows = report.rows_loaded,
            succeeded = report.stats.succeeded,
            failed = report.stats.failed,
            "pipeline run complete"
        );
        Ok(report)
    }
}

/// Convenience constructor wiring everything from configuration.
pub fn pipeline_from_config(
    config: &EtlConfig,
    warehouse: Arc<dyn Warehouse>,
) -> EtlPipeline {
    let extractor = BatchExtractor::new(Arc::new(configured_rate_limiter(config)), config.retry);
    let transformer = Transformer::new().with_ticker_column("symbol");
    EtlPipeline::new(extractor, transformer, Loader::new(warehouse))
}
