// src/ticker_list.rs

use scraper::{Html, Selector};
use std::path::Path;
use tracing::info;

use crate::error::{EtlError, EtlResult};
use crate::model::Ticker;
use crate::session::HttpSession;

pub const TICKER_COLUMN: &str = "Ticker";
pub const SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// Reads the `Ticker` column of a CSV file, ignoring any other columns.
pub fn read_ticker_csv(path: impl AsRef<Path>) -> EtlResult<Vec<Ticker>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(TICKER_COLUMN))
        .ok_or_else(|| {
            EtlError::InvalidInput(format!(
                "{} has no `{TICKER_COLUMN}` column",
                path.display()
            ))
        })?;

    let mut tickers = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(symbol) = record.get(column).filter(|s| !s.trim().is_empty()) {
            tickers.push(Ticker::new(symbol)?);
        }
    }

    info!(path = %path.display(), tickers = tickers.len(), "ticker list loaded");
    Ok(tickers)
}

pub fn write_ticker_csv(path: impl AsRef<Path>, tickers: &[Ticker]) -> EtlResult<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([TICKER_COLUMN])?;
    for ticker in tickers {
        writer.write_record([ticker.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Takes the first cell of every body row of the first table body in `html`.
pub fn scrape_ticker_table(html: &str) -> EtlResult<Vec<Ticker>> {
    let document = Html::parse_document(html);
    let tbody = selector("tbody")?;
    let tr = selector("tr")?;
    let td = selector("td")?;

    let body = document
        .select(&tbody)
        .next()
        .ok_or_else(|| EtlError::InvalidInput("page has no table body".into()))?;

    let tickers = body
        .select(&tr)
        .filter_map(|row| row.select(&td).next())
        .map(|cell| cell.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .map(Ticker::new)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(tickers)
}

pub async fn fetch_ticker_table(session: &HttpSession, url: &str) -> EtlResult<Vec<Ticker>> {
    let html = session.get_text(url, &[]).await?;
    let tickers = scrape_ticker_table(&html)?;
    info!(url, tickers = tickers.len(), "ticker table scraped");
    Ok(tickers)
}

fn selector(css: &str) -> EtlResult<Selector> {
    Selector::parse(css).map_err(|e| EtlError::InvalidInput(format!("bad selector {css:?}: {e}")))
}
