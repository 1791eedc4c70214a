use rust_decimal::Decimal;
use std::collections::HashMap;

/// One internally tracked holding. This bookkeeping is independent of the
/// brokerage's own view; the two are reconciled at startup and the engine
/// is defensive about disagreements thereafter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPosition {
    pub quantity: u64,
    pub avg_cost: Decimal,
}

/// In-memory position state for the live/paper execution path.
///
/// Buys fold into a weighted-average cost basis; sells realize P&L against
/// that average. The book never goes short: a sell larger than the holding
/// is clamped.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: HashMap<String, TrackedPosition>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity(&self, ticker: &str) -> u64 {
        self.positions.get(ticker).map_or(0, |p| p.quantity)
    }

    pub fn get(&self, ticker: &str) -> Option<&TrackedPosition> {
        self.positions.get(ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &String> {
        self.positions.keys()
    }

    /// Replaces any existing entry; used by startup reconciliation.
    pub fn seed(&mut self, ticker: &str, quantity: u64, avg_cost: Decimal) {
        if quantity == 0 {
            self.positions.remove(ticker);
            return;
        }
        self.positions
            .insert(ticker.to_string(), TrackedPosition { quantity, avg_cost });
    }

    /// Folds a fill into the weighted-average cost basis and returns the
    /// resulting position.
    pub fn update_after_buy(&mut self, ticker: &str, quantity: u64, price: Decimal) -> TrackedPosition {
        let entry = self
            .positions
            .entry(ticker.to_string())
            .or_insert(TrackedPosition {
                quantity: 0,
                avg_cost: Decimal::ZERO,
            });
        let cost_basis =
            entry.avg_cost * Decimal::from(entry.quantity) + price * Decimal::from(quantity);
        entry.quantity += quantity;
        entry.avg_cost = cost_basis / Decimal::from(entry.quantity);
        *entry
    }

    /// Realizes P&L against the average cost and returns `(realized_pnl,
    /// remaining_position)`. A fully closed position is removed from the
    /// book; the returned snapshot reports zero quantity and cost.
    pub fn update_after_sell(
        &mut self,
        ticker: &str,
        quantity: u64,
        price: Decimal,
    ) -> (Decimal, TrackedPosition) {
        let Some(entry) = self.positions.get_mut(ticker) else {
            return (
                Decimal::ZERO,
                TrackedPosition {
                    quantity: 0,
                    avg_cost: Decimal::ZERO,
                },
            );
        };

        let sold = quantity.min(entry.quantity);
        let realized = (price - entry.avg_cost) * Decimal::from(sold);
        entry.quantity -= sold;

        let remaining = if entry.quantity == 0 {
            self.positions.remove(ticker);
            TrackedPosition {
                quantity: 0,
                avg_cost: Decimal::ZERO,
            }
        } else {
            *entry
        };

        (realized, remaining)
    }
}
