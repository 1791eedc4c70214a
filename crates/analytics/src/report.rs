use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A complete performance summary derived from one equity curve.
///
/// Computed once per `from_equity_curve` call and never incrementally
/// updated. Percent-valued fields carry percents (25.0 means 25%), matching
/// how the numbers are reported downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // I. Returns
    pub total_return: Decimal,
    /// Annualized return (CAGR), percent.
    pub annual_return: Decimal,
    pub monthly_return: Decimal,

    // II. Risk-adjusted ratios
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub calmar_ratio: Decimal,

    // III. Risk
    /// Annualized volatility (daily stdev x sqrt(252)), percent.
    pub volatility: Decimal,
    /// Maximum peak-to-trough decline, reported as a positive percent.
    pub max_drawdown: Decimal,
    /// Longest consecutive run of bars spent below a running equity peak.
    pub max_drawdown_duration: usize,

    // IV. Trade statistics, filled in by the replay engine from closed trades.
    pub win_rate: Decimal,
    /// Gross profit / gross loss. `None` when there are no losing trades.
    pub profit_factor: Option<Decimal>,
    pub num_trades: usize,

    pub trading_days: usize,
}

impl PerformanceMetrics {
    /// Creates a zeroed-out metrics object, the result for degenerate input.
    pub fn zeroed() -> Self {
        Self {
            total_return: Decimal::ZERO,
            annual_return: Decimal::ZERO,
            monthly_return: Decimal::ZERO,
            sharpe_ratio: Decimal::ZERO,
            sortino_ratio: Decimal::ZERO,
            calmar_ratio: Decimal::ZERO,
            volatility: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            max_drawdown_duration: 0,
            win_rate: Decimal::ZERO,
            profit_factor: None,
            num_trades: 0,
            trading_days: 0,
        }
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::zeroed()
    }
}
