use crate::enums::{OrderSide, SignalAction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable record of one executed fill. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub side: OrderSide,
    /// Whole shares, always > 0.
    pub quantity: u64,
    pub price: Decimal,
    /// Commission charged on this fill, in dollars.
    pub commission: Decimal,
    /// Modeled slippage per share, in dollars.
    pub slippage: Decimal,
    /// Regulatory fees (SEC + TAF), in dollars. Zero on buys.
    pub fees: Decimal,
}

impl Trade {
    /// Dollar value of the trade (price x quantity).
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Total transaction cost: commission + |slippage x quantity| + regulatory fees.
    pub fn total_cost(&self) -> Decimal {
        self.commission + (self.slippage * Decimal::from(self.quantity)).abs() + self.fees
    }
}

/// A normalized strategy signal.
///
/// Strategy implementations are external collaborators; whatever protocol they
/// speak is adapted into this one shape before it reaches the execution layer.
/// Only `reason` and `notional` are interpreted; `metadata` is carried through
/// to the trade log verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub ticker: String,
    pub action: SignalAction,
    /// Explicit share count. When absent, the execution layer sizes the order.
    pub quantity: Option<u64>,
    /// Target dollar value for a buy, overriding the configured maximum.
    pub notional: Option<Decimal>,
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Signal {
    pub fn new(ticker: impl Into<String>, action: SignalAction) -> Self {
        Self {
            ticker: ticker.into(),
            action,
            quantity: None,
            notional: None,
            reason: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_notional(mut self, notional: Decimal) -> Self {
        self.notional = Some(notional);
        self
    }
}

/// One mark-to-market observation of total portfolio value (cash + positions).
/// Appended once per bar or polling tick; the sequence forms the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}
