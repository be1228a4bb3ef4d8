// src/transformer.rs

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::TransformError;
use crate::model::{RawPayload, Ticker};

/// Days between 0001-01-01 and 1970-01-01, the offset polars stores dates from.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Flat, typed rows ready for the warehouse.
#[derive(Debug, Clone)]
pub struct TabularRecords {
    pub frame: DataFrame,
    pub rejected_rows: usize,
}

impl TabularRecords {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

/// Flattens raw payloads into one `DataFrame`.
///
/// The date column becomes `Date`, the volume column `Int64`; every other field
/// keeps whatever type its values agree on.
#[derive(Debug, Clone)]
pub struct Transformer {
    date_field: String,
    volume_field: String,
    ticker_column: Option<String>,
}

impl Default for Transformer {
    fn default() -> Self {
        Transformer {
            date_field: "date".to_string(),
            volume_field: "volume".to_string(),
            ticker_column: None,
        }
    }
}

struct Row<'a> {
    ticker: &'a Ticker,
    record: &'a Map<String, Value>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_field(mut self, name: impl Into<String>) -> Self {
        self.date_field = name.into();
        self
    }

    pub fn with_volume_field(mut self, name: impl Into<String>) -> Self {
        self.volume_field = name.into();
        self
    }

    /// Adds a column holding each payload's ticker when a record lacks it.
    pub fn with_ticker_column(mut self, name: impl Into<String>) -> Self {
        self.ticker_column = Some(name.into());
        self
    }

    pub fn transform(&self, payloads: &[RawPayload]) -> Result<TabularRecords, TransformError> {
        let rows = flatten(payloads)?;

        let first = rows.first().ok_or(TransformError::NoRecords)?;
        for field in [&self.date_field, &self.volume_field] {
            if first.record.get(field).map_or(true, Value::is_null) {
                return Err(TransformError::MissingField {
                    field: field.clone(),
                });
            }
        }

        let mut kept = Vec::with_capacity(rows.len());
        let mut dates = Vec::with_capacity(rows.len());
        let mut volumes = Vec::with_capacity(rows.len());
        let mut rejected_rows = 0;

        for (index, row) in rows.iter().enumerate() {
            let date = row.record.get(&self.date_field).and_then(parse_date);
            let volume = row.record.get(&self.volume_field).and_then(parse_volume);
            match (date, volume) {
                (Some(date), Some(volume)) => {
                    dates.push(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE);
                    volumes.push(volume);
                    kept.push(row);
                }
                _ => {
                    debug!(index, ticker = %row.ticker, "rejecting row without valid date/volume");
                    rejected_rows += 1;
                }
            }
        }

        let mut columns = vec![
            Series::new(&self.date_field, dates).cast(&DataType::Date)?,
        ];
        if let Some(name) = &self.ticker_column {
            let tickers: Vec<String> = kept
                .iter()
                .map(|row| match row.record.get(name) {
                    Some(Value::String(symbol)) => symbol.clone(),
                    _ => row.ticker.to_string(),
                })
                .collect();
            columns.push(Series::new(name, tickers));
        }
        for name in self.passthrough_columns(&rows) {
            if name == self.volume_field {
                columns.push(Series::new(&self.volume_field, &volumes));
            } else {
                columns.push(passthrough_series(&name, &kept));
            }
        }

        let frame = DataFrame::new(columns)?;

        if rejected_rows > 0 {
            warn!(rejected_rows, "rows rejected during transform");
        }
        info!(rows = frame.height(), columns = frame.width(), "payloads transformed");

        Ok(TabularRecords {
            frame,
            rejected_rows,
        })
    }

    /// Field names in first-seen order, excluding the date and ticker columns.
    fn passthrough_columns(&self, rows: &[Row<'_>]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in rows {
            for key in row.record.keys() {
                let reserved = *key == self.date_field || self.ticker_column.as_ref() == Some(key);
                if !reserved && !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }
}

/// One level of flattening, with the shape decided by the first payload.
fn flatten(payloads: &[RawPayload]) -> Result<Vec<Row<'_>>, TransformError> {
    let first = payloads.first().ok_or(TransformError::EmptyInput)?;
    let sequences = first.is_sequence();

    let mut rows = Vec::new();
    for (index, payload) in payloads.iter().enumerate() {
        match (&payload.body, sequences) {
            (Value::Array(records), true) => {
                for record in records {
                    let record = record
                        .as_object()
                        .ok_or(TransformError::NotARecord { index })?;
                    rows.push(Row {
                        ticker: &payload.ticker,
                        record,
                    });
                }
            }
            (Value::Object(record), false) => rows.push(Row {
                ticker: &payload.ticker,
                record,
            }),
            (_, true) => {
                return Err(TransformError::MixedShape {
                    index,
                    expected: "array of records",
                })
            }
            (_, false) => {
                return Err(TransformError::MixedShape {
                    index,
                    expected: "single record",
                })
            }
        }
    }
    Ok(rows)
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|dt| dt.date())
                })
                .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        }
        Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

/// Whole shares; fractional values are truncated, negatives rejected.
fn parse_volume(value: &Value) -> Option<i64> {
    let volume = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_volume)),
        Value::String(raw) => {
            let raw = raw.trim();
            raw.parse::<i64>()
                .ok()
                .or_else(|| raw.parse::<f64>().ok().and_then(float_volume))
        }
        _ => None,
    }?;
    (volume >= 0).then_some(volume)
}

// Fractions truncate toward zero; anything outside the i64 range is rejected.
fn float_volume(f: f64) -> Option<i64> {
    (f.is_finite() && f >= 0.0 && f < i64::MAX as f64).then(|| f.trunc() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Str,
}

fn infer_kind<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values.flatten() {
        let this = match value {
            Value::Null => continue,
            Value::Bool(_) => ColumnKind::Bool,
            Value::Number(n) if n.is_i64() => ColumnKind::Int,
            Value::Number(_) => ColumnKind::Float,
            _ => return ColumnKind::Str,
        };
        kind = Some(match (kind, this) {
            (None, this) => this,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Str,
        });
    }
    kind.unwrap_or(ColumnKind::Str)
}

fn passthrough_series(name: &str, rows: &[&Row<'_>]) -> Series {
    let values = || rows.iter().map(|row| row.record.get(name));
    match infer_kind(values()) {
        ColumnKind::Int => {
            let column: Vec<Option<i64>> = values().map(|v| v.and_then(Value::as_i64)).collect();
            Series::new(name, column)
        }
        ColumnKind::Float => {
            let column: Vec<Option<f64>> = values().map(|v| v.and_then(Value::as_f64)).collect();
            Series::new(name, column)
        }
        ColumnKind::Bool => {
            let column: Vec<Option<bool>> = values().map(|v| v.and_then(Value::as_bool)).collect();
            Series::new(name, column)
        }
        ColumnKind::Str => {
            let column: Vec<Option<String>> = values()
                .map(|v| match v {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect();
            Series::new(name, column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dates_accept_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2);
        assert_eq!(parse_date(&json!("2024-01-02")), expected);
        assert_eq!(parse_date(&json!("2024-01-02 16:00:00")), expected);
        assert_eq!(parse_date(&json!("2024-01-02T21:00:00Z")), expected);
        assert_eq!(parse_date(&json!(1704229200000i64)), expected);
        assert_eq!(parse_date(&json!("02/01/2024")), None);
        assert_eq!(parse_date(&Value::Null), None);
    }

    #[test]
    fn volume_coercion() {
        assert_eq!(parse_volume(&json!("100")), Some(100));
        assert_eq!(parse_volume(&json!(" 82488674 ")), Some(82_488_674));
        assert_eq!(parse_volume(&json!(2.5e7)), Some(25_000_000));
        assert_eq!(parse_volume(&json!("1234.9")), Some(1234));
        assert_eq!(parse_volume(&json!(-5)), None);
        assert_eq!(parse_volume(&json!(-0.5)), None);
        assert_eq!(parse_volume(&json!(1e30)), None);
        assert_eq!(parse_volume(&json!("99999999999999999999")), None);
        assert_eq!(parse_volume(&json!("1e19")), None);
        assert_eq!(parse_volume(&json!("n/a")), None);
        assert_eq!(parse_volume(&json!(true)), None);
    }

    #[test]
    fn kind_inference_widens_ints_to_floats() {
        let a = json!(1);
        let b = json!(1.5);
        let s = json!("x");
        let t = json!(true);
        assert_eq!(infer_kind([Some(&a), None].into_iter()), ColumnKind::Int);
        assert_eq!(infer_kind([Some(&a), Some(&b)].into_iter()), ColumnKind::Float);
        assert_eq!(infer_kind([Some(&a), Some(&s)].into_iter()), ColumnKind::Str);
        assert_eq!(infer_kind([Some(&t)].into_iter()), ColumnKind::Bool);
        assert_eq!(infer_kind([None, None].into_iter()), ColumnKind::Str);
    }

    #[test]
    fn epoch_offset_matches_unix_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch.num_days_from_ce(), EPOCH_DAYS_FROM_CE);
    }
}
