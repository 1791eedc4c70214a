use crate::report::PerformanceMetrics;
use core_types::EquityPoint;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const HUNDRED: Decimal = dec!(100);
const TRADING_DAYS_PER_YEAR: Decimal = dec!(252);

impl PerformanceMetrics {
    /// Derives the full metrics summary from an equity curve.
    ///
    /// Degenerate input (fewer than two points, or a non-positive starting
    /// capital) yields an all-zero object. Trade statistics (`win_rate`,
    /// `profit_factor`, `num_trades`) are left zeroed here; the replay engine
    /// fills them in from closed-trade P&Ls.
    pub fn from_equity_curve(
        equity_curve: &[EquityPoint],
        initial_capital: Decimal,
        risk_free_rate: Decimal,
    ) -> PerformanceMetrics {
        if equity_curve.len() < 2 || initial_capital <= Decimal::ZERO {
            return PerformanceMetrics::zeroed();
        }

        let returns: Vec<Decimal> = equity_curve
            .windows(2)
            .map(|w| {
                let prev = w[0].value;
                if prev.is_zero() {
                    Decimal::ZERO
                } else {
                    (w[1].value - prev) / prev
                }
            })
            .collect();

        let final_value = equity_curve[equity_curve.len() - 1].value;
        let total_return = (final_value - initial_capital) / initial_capital * HUNDRED;

        // CAGR, assuming 252 trading days per year.
        let trading_days = equity_curve.len();
        let years = Decimal::from(trading_days) / TRADING_DAYS_PER_YEAR;
        let annual_return = if years > Decimal::ZERO
            && final_value > Decimal::ZERO
            && initial_capital > Decimal::ZERO
        {
            let exponent = (Decimal::ONE / years).to_f64().unwrap_or(0.0);
            ((final_value / initial_capital).powf(exponent) - Decimal::ONE) * HUNDRED
        } else {
            Decimal::ZERO
        };
        let monthly_return = if annual_return.is_zero() {
            Decimal::ZERO
        } else {
            annual_return / dec!(12)
        };

        let sqrt_252 = TRADING_DAYS_PER_YEAR.sqrt().unwrap_or_default();
        let daily_vol = sample_stdev(&returns);
        let volatility = daily_vol * sqrt_252 * HUNDRED;

        // Sharpe, annualized against a daily-compounded risk-free rate.
        let sharpe_ratio = if daily_vol > Decimal::ZERO {
            let daily_rf = (Decimal::ONE + risk_free_rate).powf(1.0 / 252.0) - Decimal::ONE;
            (mean(&returns) - daily_rf) / daily_vol * sqrt_252
        } else {
            Decimal::ZERO
        };

        // Sortino uses downside deviation only; with no losing days it falls
        // back to the Sharpe ratio.
        let downside: Vec<Decimal> = returns
            .iter()
            .copied()
            .filter(|r| *r < Decimal::ZERO)
            .collect();
        let sortino_ratio = if downside.is_empty() {
            sharpe_ratio
        } else {
            let downside_std = sample_stdev(&downside);
            if downside_std > Decimal::ZERO {
                mean(&returns) / downside_std * sqrt_252
            } else {
                Decimal::ZERO
            }
        };

        let (max_drawdown, max_drawdown_duration) = drawdown_stats(equity_curve);

        let calmar_ratio = if max_drawdown > Decimal::ZERO {
            annual_return / max_drawdown
        } else {
            Decimal::ZERO
        };

        PerformanceMetrics {
            total_return,
            annual_return,
            monthly_return,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            volatility,
            max_drawdown,
            max_drawdown_duration,
            win_rate: Decimal::ZERO,
            profit_factor: None,
            num_trades: 0,
            trading_days,
        }
    }
}

/// Maximum drawdown (positive percent) and the longest consecutive run of
/// bars spent below a running equity peak.
fn drawdown_stats(equity_curve: &[EquityPoint]) -> (Decimal, usize) {
    let mut peak = equity_curve[0].value;
    let mut max_dd = Decimal::ZERO;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for point in equity_curve {
        if point.value > peak {
            peak = point.value;
        }
        let drawdown = if peak.is_zero() {
            Decimal::ZERO
        } else {
            (point.value - peak) / peak * HUNDRED
        };
        if drawdown < Decimal::ZERO {
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
            max_dd = max_dd.max(drawdown.abs());
        } else {
            current_duration = 0;
        }
    }

    (max_dd, max_duration)
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

/// Sample standard deviation (n - 1 denominator, as pandas computes it).
fn sample_stdev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let mu = mean(values);
    let variance = values
        .iter()
        .map(|v| (*v - mu) * (*v - mu))
        .sum::<Decimal>()
        / Decimal::from(values.len() - 1);
    variance.sqrt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn curve(values: &[i64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| EquityPoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                value: Decimal::from(*v),
            })
            .collect()
    }

    #[test]
    fn degenerate_input_yields_zeroed_metrics() {
        let metrics =
            PerformanceMetrics::from_equity_curve(&curve(&[100]), dec!(100), Decimal::ZERO);
        assert_eq!(metrics, PerformanceMetrics::zeroed());
    }

    #[test]
    fn max_drawdown_of_reference_curve_is_25_pct() {
        let metrics = PerformanceMetrics::from_equity_curve(
            &curve(&[100, 120, 90, 110]),
            dec!(100),
            Decimal::ZERO,
        );
        assert_eq!(metrics.max_drawdown, dec!(25));
        // Both the 90 and 110 bars sit below the 120 peak.
        assert_eq!(metrics.max_drawdown_duration, 2);
        assert_eq!(metrics.total_return, dec!(10));
        assert_eq!(metrics.trading_days, 4);
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let points = curve(&[100, 105, 103, 108, 104, 111]);
        let a = PerformanceMetrics::from_equity_curve(&points, dec!(100), Decimal::ZERO);
        let b = PerformanceMetrics::from_equity_curve(&points, dec!(100), Decimal::ZERO);
        assert_eq!(a, b);
    }

    #[test]
    fn flat_curve_has_zero_volatility_and_sharpe() {
        let metrics = PerformanceMetrics::from_equity_curve(
            &curve(&[100, 100, 100, 100]),
            dec!(100),
            Decimal::ZERO,
        );
        assert_eq!(metrics.volatility, Decimal::ZERO);
        assert_eq!(metrics.sharpe_ratio, Decimal::ZERO);
        assert_eq!(metrics.max_drawdown, Decimal::ZERO);
        assert_eq!(metrics.calmar_ratio, Decimal::ZERO);
    }

    #[test]
    fn sortino_falls_back_to_sharpe_without_losing_days() {
        let metrics = PerformanceMetrics::from_equity_curve(
            &curve(&[100, 102, 105, 109]),
            dec!(100),
            Decimal::ZERO,
        );
        assert_eq!(metrics.sortino_ratio, metrics.sharpe_ratio);
        assert!(metrics.sharpe_ratio > Decimal::ZERO);
    }

    #[test]
    fn losing_curve_reports_negative_returns() {
        let metrics = PerformanceMetrics::from_equity_curve(
            &curve(&[100, 95, 90, 85]),
            dec!(100),
            Decimal::ZERO,
        );
        assert_eq!(metrics.total_return, dec!(-15));
        assert!(metrics.annual_return < Decimal::ZERO);
        assert_eq!(metrics.max_drawdown, dec!(15));
        assert_eq!(metrics.max_drawdown_duration, 3);
    }
}
