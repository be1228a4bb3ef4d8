// src/model.rs

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::EtlError;

/// Exchange ticker symbol such as `AAPL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: impl AsRef<str>) -> Result<Self, EtlError> {
        let symbol = symbol.as_ref().trim();
        if symbol.is_empty() {
            return Err(EtlError::InvalidInput("ticker symbol is empty".into()));
        }
        Ok(Ticker(symbol.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a ticker list, failing on the first blank symbol.
    pub fn parse_list<I, S>(symbols: I) -> Result<Vec<Ticker>, EtlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        symbols.into_iter().map(Ticker::new).collect()
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Body of one successful fetch: a single JSON record or an array of records.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub ticker: Ticker,
    pub body: Value,
}

impl RawPayload {
    pub fn new(ticker: Ticker, body: Value) -> Self {
        RawPayload { ticker, body }
    }

    pub fn is_sequence(&self) -> bool {
        self.body.is_array()
    }
}

/// Name of the warehouse table rows are appended to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination(String);

impl Destination {
    pub fn new(table: impl Into<String>) -> Self {
        Destination(table.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_is_trimmed_and_non_empty() {
        assert_eq!(Ticker::new("  MSFT ").unwrap().as_str(), "MSFT");
        assert!(Ticker::new("   ").is_err());
    }

    #[test]
    fn parse_list_keeps_order_and_duplicates() {
        let tickers = Ticker::parse_list(["AAPL", "MSFT", "AAPL"]).unwrap();
        let symbols: Vec<_> = tickers.iter().map(Ticker::as_str).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "AAPL"]);
    }
}
