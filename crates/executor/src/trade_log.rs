use crate::error::ExecutionError;
use chrono::{DateTime, NaiveDate, Utc};
use core_types::{OrderSide, Signal};
use rust_decimal::Decimal;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// One row destined for the daily trade log.
#[derive(Debug, Clone)]
pub struct FillRecord {
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    pub reason: Option<String>,
    pub metadata: String,
    pub realized_pnl: Decimal,
    pub position_quantity: u64,
    pub position_avg_cost: Decimal,
}

impl FillRecord {
    /// Flattens a signal's free-form metadata into the log's `k=v; k=v` form.
    pub fn metadata_from_signal(signal: &Signal) -> String {
        signal
            .metadata
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

const HEADER: [&str; 12] = [
    "timestamp",
    "ticker",
    "side",
    "quantity",
    "price",
    "notional",
    "reason",
    "metadata",
    "realized_pnl",
    "cumulative_pnl",
    "position_quantity",
    "position_avg_cost",
];

/// Append-only CSV sink, one file per calendar day under `root`.
///
/// `cumulative_pnl` is the running realized total for the day the row
/// belongs to; it resets when the date rolls over. The counter is owned by
/// this sink, not reloaded from disk, so a process restart starts the
/// running total from zero mid-day.
pub struct TradeLog {
    root: PathBuf,
    current_day: Option<NaiveDate>,
    cumulative_pnl: Decimal,
}

impl TradeLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current_day: None,
            cumulative_pnl: Decimal::ZERO,
        }
    }

    pub fn append(&mut self, fill: &FillRecord) -> Result<(), ExecutionError> {
        let day = fill.timestamp.date_naive();
        if self.current_day != Some(day) {
            self.current_day = Some(day);
            self.cumulative_pnl = Decimal::ZERO;
        }
        self.cumulative_pnl += fill.realized_pnl;

        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{}.csv", day.format("%Y-%m-%d")));
        let needs_header = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(HEADER)?;
        }

        let notional = fill.price * Decimal::from(fill.quantity);
        writer.write_record([
            fill.timestamp.to_rfc3339(),
            fill.ticker.clone(),
            fill.side.to_string(),
            fill.quantity.to_string(),
            fill.price.to_string(),
            notional.to_string(),
            fill.reason.clone().unwrap_or_default(),
            fill.metadata.clone(),
            fill.realized_pnl.to_string(),
            self.cumulative_pnl.to_string(),
            fill.position_quantity.to_string(),
            fill.position_avg_cost.to_string(),
        ])?;
        writer.flush()?;

        tracing::debug!(
            ticker = fill.ticker,
            side = %fill.side,
            day = %day,
            cumulative_pnl = %self.cumulative_pnl,
            "trade logged"
        );
        Ok(())
    }

    pub fn cumulative_pnl(&self) -> Decimal {
        self.cumulative_pnl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn fill(hour: u32, day: u32, realized: Decimal) -> FillRecord {
        FillRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 30, 0).unwrap(),
            ticker: "TQQQ".to_string(),
            side: OrderSide::Sell,
            quantity: 10,
            price: dec!(62.50),
            reason: Some("take_profit".to_string()),
            metadata: "atr=1.2".to_string(),
            realized_pnl: realized,
            position_quantity: 0,
            position_avg_cost: Decimal::ZERO,
        }
    }

    #[test]
    fn rows_accumulate_a_daily_running_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TradeLog::new(dir.path());

        log.append(&fill(14, 4, dec!(100))).unwrap();
        log.append(&fill(15, 4, dec!(-30))).unwrap();
        assert_eq!(log.cumulative_pnl(), dec!(70));

        let content = std::fs::read_to_string(dir.path().join("2024-03-04.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,ticker,side"));
        assert!(lines[1].contains("take_profit"));
        assert!(lines[1].contains(",625.00,"));
        assert!(lines[2].contains(",70,"));
    }

    #[test]
    fn day_rollover_resets_the_running_total_in_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TradeLog::new(dir.path());

        log.append(&fill(14, 4, dec!(100))).unwrap();
        log.append(&fill(14, 5, dec!(25))).unwrap();

        assert_eq!(log.cumulative_pnl(), dec!(25));
        assert!(dir.path().join("2024-03-04.csv").exists());
        let next_day = std::fs::read_to_string(dir.path().join("2024-03-05.csv")).unwrap();
        assert!(next_day.lines().nth(1).unwrap().contains(",25,"));
    }
}
