//! CSV price-bar loading.
//!
//! Input is long-format: one row per (timestamp, ticker) pair. Rows sharing
//! a timestamp are folded into a single [`PriceBar`].

use crate::error::BacktestError;
use crate::PriceBar;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    ticker: String,
    close: Decimal,
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates, which are read
/// as midnight UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, BacktestError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc());
    }
    Err(BacktestError::InvalidTimestamp(raw.to_string()))
}

/// Loads bars from a `timestamp,ticker,close` CSV, grouped by timestamp and
/// returned in ascending order.
pub fn load_bars_csv(path: &Path) -> Result<Vec<PriceBar>, BacktestError> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut grouped: BTreeMap<DateTime<Utc>, PriceBar> = BTreeMap::new();
    for row in reader.deserialize() {
        let row: BarRow = row?;
        let timestamp = parse_timestamp(&row.timestamp)?;
        grouped
            .entry(timestamp)
            .or_insert_with(|| PriceBar {
                timestamp,
                closes: Default::default(),
            })
            .closes
            .insert(row.ticker, row.close);
    }

    if grouped.is_empty() {
        return Err(BacktestError::NoData);
    }

    tracing::info!(bars = grouped.len(), path = %path.display(), "loaded price data");
    Ok(grouped.into_values().collect())
}
