use crate::cost::CostModel;
use crate::error::Rejection;
use crate::position::Position;
use chrono::{DateTime, Utc};
use core_types::{EquityPoint, OrderSide, Trade};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Owns cash, per-ticker positions, the trade history and the equity curve.
///
/// The ledger is a single-writer state machine: all preconditions are checked
/// before any mutation, so `cash >= 0` holds after every accepted trade and a
/// rejected trade leaves the ledger untouched.
#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: Decimal,
    cash: Decimal,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    costs: CostModel,
}

impl Ledger {
    pub fn new(initial_capital: Decimal, costs: CostModel) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            costs,
        }
    }

    /// Clears all state back to the initial capital.
    pub fn reset(&mut self) {
        self.cash = self.initial_capital;
        self.positions.clear();
        self.trades.clear();
        self.equity_curve.clear();
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker).filter(|p| p.is_open())
    }

    /// Number of currently open positions.
    pub fn open_positions(&self) -> usize {
        self.positions.values().filter(|p| p.is_open()).count()
    }

    pub fn open_tickers(&self) -> impl Iterator<Item = &str> {
        self.positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| p.ticker.as_str())
    }

    /// Applies a fill to the ledger state, charging realistic costs.
    ///
    /// Buys are rejected when `notional + cost` exceeds cash; sells are
    /// rejected when the held quantity is short of the request. Rejection
    /// happens before mutation, never as a rollback.
    pub fn execute_trade(
        &mut self,
        timestamp: DateTime<Utc>,
        ticker: &str,
        side: OrderSide,
        quantity: u64,
        price: Decimal,
    ) -> Result<Trade, Rejection> {
        if quantity == 0 {
            return Err(Rejection::NonPositiveQuantity);
        }
        if price <= Decimal::ZERO {
            return Err(Rejection::NonPositivePrice(price));
        }

        let notional = price * Decimal::from(quantity);
        let total_cost = self.costs.total_cost(notional, quantity, side);

        match side {
            OrderSide::Buy => {
                let required = notional + total_cost;
                if required > self.cash {
                    tracing::warn!(
                        ticker,
                        %required,
                        available = %self.cash,
                        "insufficient cash for buy"
                    );
                    return Err(Rejection::InsufficientCash {
                        required,
                        available: self.cash,
                    });
                }

                self.cash -= required;

                let pos = self
                    .positions
                    .entry(ticker.to_string())
                    .or_insert_with(|| Position::new(ticker));
                let cost_basis =
                    pos.avg_entry_price * Decimal::from(pos.quantity) + notional;
                pos.quantity += quantity;
                pos.avg_entry_price = cost_basis / Decimal::from(pos.quantity);
                if pos.entry_timestamp.is_none() {
                    pos.entry_timestamp = Some(timestamp);
                }
            }
            OrderSide::Sell => {
                let held = self.positions.get(ticker).map_or(0, |p| p.quantity);
                if held < quantity {
                    tracing::warn!(ticker, held, requested = quantity, "insufficient shares");
                    return Err(Rejection::InsufficientShares {
                        ticker: ticker.to_string(),
                        held,
                        requested: quantity,
                    });
                }

                // A sell whose cost exceeds its proceeds drains cash; it
                // must fail the same invariant check a buy does.
                let proceeds = notional - total_cost;
                if self.cash + proceeds < Decimal::ZERO {
                    tracing::warn!(
                        ticker,
                        cost = %total_cost,
                        %notional,
                        available = %self.cash,
                        "sell cost exceeds proceeds and cash"
                    );
                    return Err(Rejection::InsufficientCash {
                        required: total_cost - notional,
                        available: self.cash,
                    });
                }

                self.cash += proceeds;

                // Precondition above guarantees the entry exists.
                if let Some(pos) = self.positions.get_mut(ticker) {
                    pos.quantity -= quantity;
                    if pos.quantity == 0 {
                        pos.avg_entry_price = Decimal::ZERO;
                        pos.entry_timestamp = None;
                    }
                }
            }
        }

        let trade = Trade {
            timestamp,
            ticker: ticker.to_string(),
            side,
            quantity,
            price,
            commission: self.costs.commission(notional),
            slippage: self.costs.slippage_per_share(price),
            fees: self.costs.regulatory_fees(notional, quantity, side),
        };

        tracing::debug!(
            ticker,
            %side,
            quantity,
            %price,
            cost = %total_cost,
            cash = %self.cash,
            "executed trade"
        );

        self.trades.push(trade.clone());
        Ok(trade)
    }

    /// Marks every open position to the supplied prices and appends an
    /// `EquityPoint`. A missing price falls back to the average entry price.
    /// Each call appends; nothing is overwritten.
    pub fn update_equity(
        &mut self,
        timestamp: DateTime<Utc>,
        prices: &HashMap<String, Decimal>,
    ) -> Decimal {
        let positions_value: Decimal = self
            .positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| p.market_value(*prices.get(&p.ticker).unwrap_or(&p.avg_entry_price)))
            .sum();

        let value = self.cash + positions_value;
        self.equity_curve.push(EquityPoint { timestamp, value });
        value
    }

    /// Period return computed from the last two equity points, if any.
    pub fn last_return(&self) -> Option<Decimal> {
        let n = self.equity_curve.len();
        if n < 2 {
            return None;
        }
        let prev = self.equity_curve[n - 2].value;
        let curr = self.equity_curve[n - 1].value;
        if prev.is_zero() {
            return Some(Decimal::ZERO);
        }
        Some((curr - prev) / prev)
    }

    /// Replays the full trade history through FIFO lot matching and returns
    /// the realized P&L of every sell match, oldest lots first.
    ///
    /// Each sell's *full* transaction cost is charged against every partial
    /// lot match within that sell. When a single sell closes multiple lots
    /// this double-counts the cost; the behavior is kept deliberately so that
    /// historical P&L numbers stay comparable with prior runs.
    pub fn realized_pnls(&self) -> Vec<Decimal> {
        let mut pnls = Vec::new();
        let mut lots: HashMap<&str, VecDeque<(Decimal, u64)>> = HashMap::new();

        for trade in &self.trades {
            match trade.side {
                OrderSide::Buy => {
                    lots.entry(trade.ticker.as_str())
                        .or_default()
                        .push_back((trade.price, trade.quantity));
                }
                OrderSide::Sell => {
                    let Some(queue) = lots.get_mut(trade.ticker.as_str()) else {
                        continue;
                    };
                    let sell_cost = trade.total_cost();
                    let mut remaining = trade.quantity;

                    while remaining > 0 {
                        let Some((lot_price, lot_qty)) = queue.front_mut() else {
                            break;
                        };
                        if *lot_qty <= remaining {
                            let matched = *lot_qty;
                            pnls.push(
                                (trade.price - *lot_price) * Decimal::from(matched) - sell_cost,
                            );
                            remaining -= matched;
                            queue.pop_front();
                        } else {
                            pnls.push(
                                (trade.price - *lot_price) * Decimal::from(remaining) - sell_cost,
                            );
                            *lot_qty -= remaining;
                            remaining = 0;
                        }
                    }
                }
            }
        }

        pnls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use configuration::{CostConfig, Settings};
    use rust_decimal_macros::dec;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    fn free_costs() -> CostModel {
        CostModel::new(CostConfig {
            commission_fixed: Decimal::ZERO,
            commission_pct: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            sec_fee_rate: Decimal::ZERO,
            taf_fee_per_share: Decimal::ZERO,
        })
    }

    #[test]
    fn zero_cost_round_trip_conserves_cash() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(10), "AAPL", OrderSide::Buy, 10, dec!(100))
            .unwrap();
        ledger
            .execute_trade(ts(11), "AAPL", OrderSide::Sell, 10, dec!(100))
            .unwrap();

        assert_eq!(ledger.cash(), dec!(10000));
        assert_eq!(ledger.realized_pnls(), vec![Decimal::ZERO]);
        assert!(ledger.position("AAPL").is_none());
    }

    #[test]
    fn buy_rejected_when_cash_short() {
        let mut ledger = Ledger::new(dec!(100), free_costs());
        let err = ledger
            .execute_trade(ts(10), "AAPL", OrderSide::Buy, 10, dec!(50))
            .unwrap_err();
        assert!(matches!(err, Rejection::InsufficientCash { .. }));
        // State untouched.
        assert_eq!(ledger.cash(), dec!(100));
        assert!(ledger.trades().is_empty());
    }

    #[test]
    fn sell_rejected_when_shares_short() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(10), "AAPL", OrderSide::Buy, 5, dec!(100))
            .unwrap();
        let err = ledger
            .execute_trade(ts(11), "AAPL", OrderSide::Sell, 6, dec!(100))
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::InsufficientShares {
                ticker: "AAPL".to_string(),
                held: 5,
                requested: 6,
            }
        );
    }

    #[test]
    fn sell_rejected_when_cost_exceeds_proceeds_and_cash() {
        let costs = CostModel::new(CostConfig {
            commission_fixed: dec!(5),
            commission_pct: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            sec_fee_rate: Decimal::ZERO,
            taf_fee_per_share: Decimal::ZERO,
        });
        let mut ledger = Ledger::new(dec!(15), costs);
        // Buy 10 @ $1: $10 notional + $5 commission drains cash to zero.
        ledger
            .execute_trade(ts(10), "PENNY", OrderSide::Buy, 10, dec!(1))
            .unwrap();
        assert_eq!(ledger.cash(), Decimal::ZERO);

        // Selling 1 @ $1 would net $1 - $5 = -$4; with no cash to absorb it
        // the trade must be rejected, untouched.
        let err = ledger
            .execute_trade(ts(11), "PENNY", OrderSide::Sell, 1, dec!(1))
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::InsufficientCash {
                required: dec!(4),
                available: Decimal::ZERO,
            }
        );
        assert_eq!(ledger.cash(), Decimal::ZERO);
        assert_eq!(ledger.position("PENNY").unwrap().quantity, 10);
        assert_eq!(ledger.trades().len(), 1);
    }

    #[test]
    fn buy_recomputes_weighted_average_entry() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(10), "SPY", OrderSide::Buy, 10, dec!(100))
            .unwrap();
        ledger
            .execute_trade(ts(11), "SPY", OrderSide::Buy, 10, dec!(110))
            .unwrap();

        let pos = ledger.position("SPY").unwrap();
        assert_eq!(pos.quantity, 20);
        assert_eq!(pos.avg_entry_price, dec!(105));
        assert_eq!(pos.entry_timestamp, Some(ts(10)));
    }

    #[test]
    fn flatten_clears_entry_state() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(10), "SPY", OrderSide::Buy, 10, dec!(100))
            .unwrap();
        ledger
            .execute_trade(ts(11), "SPY", OrderSide::Sell, 10, dec!(105))
            .unwrap();

        assert!(ledger.position("SPY").is_none());
        assert_eq!(ledger.open_positions(), 0);
    }

    #[test]
    fn realized_pnl_matches_worked_example() {
        // Buy 100 @ $50, sell 100 @ $55 with 5 bps slippage and the default
        // regulatory rates: pnl = 500 - total_cost(sell).
        let costs = CostModel::new(CostConfig {
            commission_fixed: Decimal::ZERO,
            commission_pct: Decimal::ZERO,
            slippage_pct: dec!(0.05),
            sec_fee_rate: dec!(0.0000278),
            taf_fee_per_share: dec!(0.000166),
        });
        let mut ledger = Ledger::new(dec!(10000), costs);
        ledger
            .execute_trade(ts(10), "XYZ", OrderSide::Buy, 100, dec!(50))
            .unwrap();
        ledger
            .execute_trade(ts(11), "XYZ", OrderSide::Sell, 100, dec!(55))
            .unwrap();

        let sell_cost = dec!(5500) * dec!(0.0005)
            + dec!(5500) * dec!(0.0000278)
            + dec!(100) * dec!(0.000166);
        assert_eq!(ledger.realized_pnls(), vec![dec!(500) - sell_cost]);
    }

    #[test]
    fn fifo_partial_sell_leaves_remainder_at_entry_price() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(10), "XYZ", OrderSide::Buy, 100, dec!(10))
            .unwrap();
        ledger
            .execute_trade(ts(11), "XYZ", OrderSide::Sell, 40, dec!(12))
            .unwrap();
        // The remaining 60 shares stay queued at $10 and match a later sell.
        ledger
            .execute_trade(ts(12), "XYZ", OrderSide::Sell, 60, dec!(11))
            .unwrap();

        assert_eq!(ledger.realized_pnls(), vec![dec!(80), dec!(60)]);
    }

    #[test]
    fn fifo_consumes_oldest_lot_first() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(9), "XYZ", OrderSide::Buy, 10, dec!(10))
            .unwrap();
        ledger
            .execute_trade(ts(10), "XYZ", OrderSide::Buy, 10, dec!(20))
            .unwrap();
        // One sell closing both lots: two matches, each charged the full cost
        // of the sell (zero here).
        ledger
            .execute_trade(ts(11), "XYZ", OrderSide::Sell, 20, dec!(15))
            .unwrap();

        assert_eq!(ledger.realized_pnls(), vec![dec!(50), dec!(-50)]);
    }

    #[test]
    fn update_equity_marks_to_market_with_fallback() {
        let mut ledger = Ledger::new(dec!(10000), free_costs());
        ledger
            .execute_trade(ts(10), "AAA", OrderSide::Buy, 10, dec!(100))
            .unwrap();
        ledger
            .execute_trade(ts(10), "BBB", OrderSide::Buy, 10, dec!(50))
            .unwrap();

        // AAA priced; BBB falls back to its average entry price.
        let prices = HashMap::from([("AAA".to_string(), dec!(110))]);
        let equity = ledger.update_equity(ts(11), &prices);

        assert_eq!(equity, dec!(8500) + dec!(1100) + dec!(500));
        assert_eq!(ledger.equity_curve().len(), 1);
    }

    #[test]
    fn last_return_uses_final_two_points() {
        let mut ledger = Ledger::new(dec!(100), free_costs());
        let prices = HashMap::new();
        ledger.update_equity(ts(10), &prices);
        assert_eq!(ledger.last_return(), None);
        ledger.update_equity(ts(11), &prices);
        assert_eq!(ledger.last_return(), Some(Decimal::ZERO));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Cash never goes negative, whatever sequence of trades the
            /// ledger is asked to apply; rejected trades change nothing.
            #[test]
            fn cash_never_negative(
                commission_fixed in 0u32..10,
                steps in proptest::collection::vec(
                    (any::<bool>(), 1u64..50, 1u32..200),
                    1..60,
                )
            ) {
                let mut cost_config = Settings::default().costs;
                cost_config.commission_fixed = Decimal::from(commission_fixed);
                let costs = CostModel::new(cost_config);
                let mut ledger = Ledger::new(dec!(5000), costs);

                for (i, (is_buy, quantity, price)) in steps.into_iter().enumerate() {
                    let side = if is_buy { OrderSide::Buy } else { OrderSide::Sell };
                    let _ = ledger.execute_trade(
                        ts(0) + chrono::Duration::minutes(i as i64),
                        "TQQQ",
                        side,
                        quantity,
                        Decimal::from(price),
                    );
                    prop_assert!(ledger.cash() >= Decimal::ZERO);
                }
            }
        }
    }
}
