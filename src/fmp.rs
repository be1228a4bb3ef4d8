// src/fmp.rs

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::model::{RawPayload, Ticker};
use crate::session::HttpSession;
use crate::source::SourceClient;

pub const SOURCE_ID: &str = "fmp";

/// Length of history requested from Financial Modeling Prep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmpSeries {
    Yearly,
    FiveYear,
}

impl FmpSeries {
    pub fn days(&self) -> u32 {
        match self {
            FmpSeries::Yearly => 365,
            FmpSeries::FiveYear => 1825,
        }
    }
}

pub struct FmpClient {
    session: HttpSession,
    config: ApiConfig,
    series: FmpSeries,
}

impl FmpClient {
    pub fn new(session: HttpSession, config: ApiConfig, series: FmpSeries) -> Self {
        FmpClient {
            session,
            config,
            series,
        }
    }

    fn url(&self, ticker: &Ticker) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), ticker)
    }
}

#[async_trait]
impl SourceClient for FmpClient {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<RawPayload, FetchError> {
        let days = self.series.days().to_string();
        let query = [
            ("timeseries", days.as_str()),
            ("apikey", self.config.api_key.as_str()),
        ];
        let json = self.session.get_json(&self.url(ticker), &query).await?;
        let body = parse_historical(ticker, json)?;
        debug!(%ticker, days = self.series.days(), "fmp payload parsed");
        Ok(RawPayload::new(ticker.clone(), body))
    }
}

/// Accepts both `{"symbol": .., "historical": [..]}` and a bare array of bars.
pub(crate) fn parse_historical(ticker: &Ticker, json: Value) -> Result<Value, FetchError> {
    let records = match json {
        Value::Array(records) => records,
        Value::Object(mut map) => {
            if let Some(message) = map.get("Error Message").and_then(Value::as_str) {
                return Err(FetchError::MalformedResponse(format!("{ticker}: {message}")));
            }
            if map.is_empty() {
                return Err(FetchError::UnknownTicker(ticker.to_string()));
            }
            match map.remove("historical") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(FetchError::MalformedResponse(format!(
                        "{ticker}: missing `historical` array"
                    )))
                }
            }
        }
        other => {
            return Err(FetchError::MalformedResponse(format!(
                "{ticker}: unexpected body type {}",
                json_kind(&other)
            )))
        }
    };

    if records.is_empty() {
        return Err(FetchError::UnknownTicker(ticker.to_string()));
    }
    Ok(Value::Array(records))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
