//! # Stockpilot Backtester Crate
//!
//! Drives a `Ledger` through historical price bars under a single-pass
//! replay loop. Decision logic is an external collaborator behind the
//! [`Strategy`] trait; the engine only executes what it is told, subject to
//! position limits and sizing.

pub mod data;
pub mod error;

pub use data::load_bars_csv;
pub use error::BacktestError;

use analytics::PerformanceMetrics;
use chrono::{DateTime, Utc};
use configuration::{BacktestSettings, Settings};
use core_types::{EquityPoint, OrderSide, Trade};
use indicatif::{ProgressBar, ProgressStyle};
use ledger::{CostModel, Ledger};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// One timestamped observation: close prices for every ticker that traded.
/// A ticker missing from `closes` is simply skipped for that bar.
#[derive(Debug, Clone)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub closes: HashMap<String, Decimal>,
}

/// What a strategy wants done on one ticker for the current bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Open or add to a position. The optional ATR switches sizing from
    /// fixed-percent to volatility-based.
    Buy {
        ticker: String,
        atr: Option<Decimal>,
    },
    /// Reduce or close a position. `None` sells the full holding.
    Sell {
        ticker: String,
        quantity: Option<u64>,
    },
}

/// The decision-making collaborator. Indicator math lives entirely on the
/// other side of this trait.
pub trait Strategy {
    fn evaluate(&mut self, bar: &PriceBar) -> Vec<Decision>;
}

/// Everything a finished replay produces.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub returns: Vec<Decimal>,
    pub metrics: PerformanceMetrics,
    pub settings: BacktestSettings,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The replay engine. Owns a private `Ledger`; nothing else writes to it.
pub struct BacktestEngine {
    settings: BacktestSettings,
    ledger: Ledger,
    returns: Vec<Decimal>,
}

impl BacktestEngine {
    pub fn new(settings: &Settings) -> Self {
        let ledger = Ledger::new(
            settings.account.initial_capital,
            CostModel::new(settings.costs.clone()),
        );
        Self {
            settings: settings.backtest.clone(),
            ledger,
            returns: Vec::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Clears all replay state so the same engine can run again.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.returns.clear();
    }

    /// True while the engine may open another position.
    pub fn can_open_position(&self) -> bool {
        self.ledger.open_positions() < self.settings.max_positions
    }

    /// Shares to buy at `price`, either volatility-based (risk amount over
    /// the ATR stop distance) or fixed-percent of portfolio value, always
    /// clipped to what cash can afford.
    pub fn calculate_position_size(&self, price: Decimal, atr: Option<Decimal>) -> u64 {
        if price <= Decimal::ZERO {
            return 0;
        }
        let cash = self.ledger.cash();

        let mut shares = match atr.filter(|a| *a > Decimal::ZERO) {
            Some(atr) => {
                let risk_amount = cash * self.settings.risk_per_trade_pct / dec!(100);
                let stop_distance = atr * self.settings.atr_multiplier;
                (risk_amount / stop_distance).floor()
            }
            None => {
                let max_value = cash * self.settings.position_size_pct / dec!(100);
                (max_value / price).floor()
            }
        };

        if shares * price > cash {
            shares = (cash / price).floor();
        }

        shares.to_u64().unwrap_or(0)
    }

    /// Replays the bars in order, executing the strategy's decisions, and
    /// produces the final accounting.
    ///
    /// Bar timestamps must be strictly increasing. Malformed or missing
    /// price data for a ticker skips that ticker for that bar only; it never
    /// halts the replay.
    pub fn run(
        &mut self,
        bars: &[PriceBar],
        strategy: &mut dyn Strategy,
    ) -> Result<BacktestResult, BacktestError> {
        if bars.is_empty() {
            return Err(BacktestError::NoData);
        }

        let progress = ProgressBar::new(bars.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap()
                .progress_chars("=>-"),
        );

        let mut last_timestamp: Option<DateTime<Utc>> = None;
        for bar in bars {
            if let Some(prev) = last_timestamp {
                if bar.timestamp <= prev {
                    return Err(BacktestError::NonMonotonicBars {
                        prev,
                        next: bar.timestamp,
                    });
                }
            }
            last_timestamp = Some(bar.timestamp);

            // 1. Mark to market first, then record the period return.
            self.ledger.update_equity(bar.timestamp, &bar.closes);
            if let Some(period_return) = self.ledger.last_return() {
                self.returns.push(period_return);
            }

            // 2. Execute whatever the strategy decided for this bar.
            for decision in strategy.evaluate(bar) {
                self.apply_decision(bar, decision);
            }

            progress.inc(1);
        }

        progress.finish_and_clear();

        Ok(self.finish(bars))
    }

    fn apply_decision(&mut self, bar: &PriceBar, decision: Decision) {
        match decision {
            Decision::Buy { ticker, atr } => {
                let Some(price) = bar.closes.get(&ticker).copied() else {
                    tracing::debug!(ticker, "no price for bar, skipping buy");
                    return;
                };
                let opening_new = self.ledger.position(&ticker).is_none();
                if opening_new && !self.can_open_position() {
                    tracing::debug!(ticker, "position limit reached, skipping buy");
                    return;
                }
                let quantity = self.calculate_position_size(price, atr);
                if quantity == 0 {
                    return;
                }
                if let Err(rejection) = self.ledger.execute_trade(
                    bar.timestamp,
                    &ticker,
                    OrderSide::Buy,
                    quantity,
                    price,
                ) {
                    tracing::info!(ticker, %rejection, "buy rejected");
                }
            }
            Decision::Sell { ticker, quantity } => {
                let Some(price) = bar.closes.get(&ticker).copied() else {
                    tracing::debug!(ticker, "no price for bar, skipping sell");
                    return;
                };
                let held = self.ledger.position(&ticker).map_or(0, |p| p.quantity);
                if held == 0 {
                    return;
                }
                let quantity = quantity.map_or(held, |q| q.min(held));
                if let Err(rejection) = self.ledger.execute_trade(
                    bar.timestamp,
                    &ticker,
                    OrderSide::Sell,
                    quantity,
                    price,
                ) {
                    tracing::info!(ticker, %rejection, "sell rejected");
                }
            }
        }
    }

    /// Computes the final metrics. Win rate and profit factor come from the
    /// FIFO realized P&Ls, i.e. from closed trades only; open positions are
    /// excluded.
    fn finish(&self, bars: &[PriceBar]) -> BacktestResult {
        let mut metrics = PerformanceMetrics::from_equity_curve(
            self.ledger.equity_curve(),
            self.ledger.initial_capital(),
            Decimal::ZERO,
        );

        let closed_pnls = self.ledger.realized_pnls();
        if !closed_pnls.is_empty() {
            let wins: Vec<Decimal> = closed_pnls
                .iter()
                .copied()
                .filter(|p| *p > Decimal::ZERO)
                .collect();
            let losses: Vec<Decimal> = closed_pnls
                .iter()
                .copied()
                .filter(|p| *p < Decimal::ZERO)
                .collect();

            metrics.win_rate =
                Decimal::from(wins.len()) / Decimal::from(closed_pnls.len());

            let total_losses: Decimal = losses.iter().sum::<Decimal>().abs();
            metrics.profit_factor = if total_losses > Decimal::ZERO {
                Some(wins.iter().sum::<Decimal>() / total_losses)
            } else {
                None
            };
        }
        metrics.num_trades = self.ledger.trades().len();

        BacktestResult {
            trades: self.ledger.trades().to_vec(),
            equity_curve: self.ledger.equity_curve().to_vec(),
            returns: self.returns.clone(),
            metrics,
            settings: self.settings.clone(),
            start: bars[0].timestamp,
            end: bars[bars.len() - 1].timestamp,
        }
    }
}
