use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Open position state for one ticker. Mutated only by the `Ledger`.
///
/// Invariant: `quantity == 0` implies `avg_entry_price == 0` and
/// `entry_timestamp == None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub quantity: u64,
    pub avg_entry_price: Decimal,
    pub entry_timestamp: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            quantity: 0,
            avg_entry_price: Decimal::ZERO,
            entry_timestamp: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0
    }

    /// Mark-to-market value at the given price.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        Decimal::from(self.quantity) * price
    }

    /// Unrealized P&L against the average entry price.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        if self.quantity == 0 {
            return Decimal::ZERO;
        }
        (price - self.avg_entry_price) * Decimal::from(self.quantity)
    }
}
