// src/alpha_vantage.rs

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::model::{RawPayload, Ticker};
use crate::session::HttpSession;
use crate::source::SourceClient;

pub const SOURCE_ID: &str = "alpha_vantage";

/// Which Alpha Vantage endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaFunction {
    /// Latest trading day only; one record per ticker.
    GlobalQuote,
    /// Roughly the last 100 trading days; a sequence of records per ticker.
    TimeSeriesDaily,
}

impl AlphaFunction {
    fn as_param(&self) -> &'static str {
        match self {
            AlphaFunction::GlobalQuote => "GLOBAL_QUOTE",
            AlphaFunction::TimeSeriesDaily => "TIME_SERIES_DAILY",
        }
    }
}

pub struct AlphaVantageClient {
    session: HttpSession,
    config: ApiConfig,
    function: AlphaFunction,
}

impl AlphaVantageClient {
    pub fn new(session: HttpSession, config: ApiConfig, function: AlphaFunction) -> Self {
        AlphaVantageClient {
            session,
            config,
            function,
        }
    }
}

#[async_trait]
impl SourceClient for AlphaVantageClient {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self, ticker: &Ticker) -> Result<RawPayload, FetchError> {
        let query = [
            ("function", self.function.as_param()),
            ("symbol", ticker.as_str()),
            ("apikey", self.config.api_key.as_str()),
        ];
        let json = self.session.get_json(&self.config.base_url, &query).await?;
        let body = match self.function {
            AlphaFunction::GlobalQuote => parse_global_quote(ticker, &json)?,
            AlphaFunction::TimeSeriesDaily => parse_daily_series(ticker, &json)?,
        };
        debug!(%ticker, function = self.function.as_param(), "alpha vantage payload parsed");
        Ok(RawPayload::new(ticker.clone(), body))
    }
}

/// Alpha Vantage reports errors and throttling with HTTP 200 and a message field.
fn check_envelope(ticker: &Ticker, json: &Value) -> Result<(), FetchError> {
    if let Some(message) = json.get("Error Message").and_then(Value::as_str) {
        return Err(FetchError::UnknownTicker(format!("{ticker}: {message}")));
    }
    for key in ["Note", "Information"] {
        if let Some(message) = json.get(key).and_then(Value::as_str) {
            return Err(FetchError::RateLimited(message.to_string()));
        }
    }
    Ok(())
}

pub(crate) fn parse_daily_series(ticker: &Ticker, json: &Value) -> Result<Value, FetchError> {
    check_envelope(ticker, json)?;

    let series = json
        .get("Time Series (Daily)")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            FetchError::MalformedResponse(format!("{ticker}: missing `Time Series (Daily)`"))
        })?;

    let mut records = series
        .iter()
        .map(|(date, bar)| {
            let bar = bar.as_object().ok_or_else(|| {
                FetchError::MalformedResponse(format!("{ticker}: bar for {date} is not an object"))
            })?;
            Ok(json!({
                "date": date,
                "open": number_field(bar, "1. open"),
                "high": number_field(bar, "2. high"),
                "low": number_field(bar, "3. low"),
                "close": number_field(bar, "4. close"),
                "volume": field(bar, "5. volume"),
            }))
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    records.sort_by(|a, b| a["date"].as_str().cmp(&b["date"].as_str()));
    Ok(Value::Array(records))
}

pub(crate) fn parse_global_quote(ticker: &Ticker, json: &Value) -> Result<Value, FetchError> {
    check_envelope(ticker, json)?;

    let quote = json
        .get("Global Quote")
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::MalformedResponse(format!("{ticker}: missing `Global Quote`")))?;

    if quote.is_empty() {
        return Err(FetchError::UnknownTicker(ticker.to_string()));
    }

    Ok(json!({
        "symbol": field(quote, "01. symbol"),
        "date": field(quote, "07. latest trading day"),
        "open": number_field(quote, "02. open"),
        "high": number_field(quote, "03. high"),
        "low": number_field(quote, "04. low"),
        "price": number_field(quote, "05. price"),
        "volume": field(quote, "06. volume"),
        "previous_close": number_field(quote, "08. previous close"),
        "change": number_field(quote, "09. change"),
        "change_percent": field(quote, "10. change percent"),
    }))
}

fn field(map: &Map<String, Value>, key: &str) -> Value {
    map.get(key).cloned().unwrap_or(Value::Null)
}

/// Prices arrive as strings like `"185.6400"`.
fn number_field(map: &Map<String, Value>, key: &str) -> Value {
    match map.get(key) {
        Some(Value::String(raw)) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .map(Value::from)
            .unwrap_or(Value::Null),
        Some(Value::Number(n)) => Value::Number(n.clone()),
        _ => Value::Null,
    }
}
