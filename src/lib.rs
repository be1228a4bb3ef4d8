// src/lib.rs

pub mod alpha_vantage;
pub mod batch_extractor;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fmp;
pub mod loader;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod rate_limiter;
pub mod retry;
pub mod session;
pub mod source;
pub mod ticker_list;
pub mod transformer;
pub mod warehouse;

pub use alpha_vantage::{AlphaFunction, AlphaVantageClient};
pub use batch_extractor::{BatchExtractor, Extraction, ExtractionOutcome, ExtractionStats, TickerFailure};
pub use cancel::CancellationFlag;
pub use config::{ApiConfig, EtlConfig};
pub use error::{EtlError, EtlResult, FailureReason, FetchError, TransformError, WarehouseError};
pub use fmp::{FmpClient, FmpSeries};
pub use loader::Loader;
pub use model::{Destination, RawPayload, Ticker};
pub use pipeline::{EtlPipeline, PipelineReport, SourceKind};
pub use rate_limiter::{Quota, RateLimiter};
pub use retry::{RetryError, RetryPolicy, Retryable};
pub use session::HttpSession;
pub use source::{FnSource, SourceClient};
pub use transformer::{TabularRecords, Transformer};
pub use warehouse::{CsvWarehouse, MemoryWarehouse, Warehouse};
