use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub account: Account,
    pub costs: CostConfig,
    pub backtest: BacktestSettings,
    pub execution: ExecutionSettings,
    pub circuit_breaker: CircuitBreakerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    /// Starting capital for simulations and the paper-trading ledger.
    pub initial_capital: Decimal,
}

/// Transaction-cost model parameters.
///
/// Percentage-valued fields are expressed as percents, not fractions:
/// `slippage_pct = 0.05` means five basis points. The cost model divides
/// by 100 internally.
#[derive(Debug, Clone, Deserialize)]
pub struct CostConfig {
    /// Fixed commission per order, in dollars. Most retail brokers charge $0.
    pub commission_fixed: Decimal,
    /// Commission as a percent of notional.
    pub commission_pct: Decimal,
    /// Modeled slippage as a percent of notional, applied on both sides.
    pub slippage_pct: Decimal,
    /// SEC fee per dollar sold. Applied only on sells.
    pub sec_fee_rate: Decimal,
    /// TAF fee per share sold, capped per order. Applied only on sells.
    pub taf_fee_per_share: Decimal,
}

/// Parameters for the backtest replay engine.
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestSettings {
    /// Maximum number of simultaneously open positions.
    pub max_positions: usize,
    /// Percent of portfolio value allocated per position for fixed-percent sizing.
    pub position_size_pct: Decimal,
    /// Percent of portfolio value risked per trade for ATR-based sizing.
    pub risk_per_trade_pct: Decimal,
    /// Stop distance multiplier for ATR-based sizing.
    pub atr_multiplier: Decimal,
}

/// Limits and cadence for the live/paper execution path.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSettings {
    /// Maximum notional for a single position, in dollars.
    pub max_position_size: Decimal,
    /// Maximum total market exposure across all positions, in dollars.
    pub max_total_exposure: Decimal,
    /// Seconds between polling iterations of the trading loop.
    pub polling_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    /// Maximum allowed daily loss, in dollars.
    pub max_daily_loss: Decimal,
    /// Halt after this many consecutive losing trades.
    pub max_consecutive_losses: u32,
    /// Maximum trades within any trailing 60-minute window.
    pub max_trades_per_hour: usize,
}

impl Settings {
    /// Rejects configurations that would make the risk limits meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "account.initial_capital must be positive".to_string(),
            ));
        }
        if self.backtest.max_positions == 0 {
            return Err(ConfigError::Invalid(
                "backtest.max_positions must be at least 1".to_string(),
            ));
        }
        if self.backtest.position_size_pct <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "backtest.position_size_pct must be positive".to_string(),
            ));
        }
        if self.execution.max_position_size <= Decimal::ZERO
            || self.execution.max_total_exposure <= Decimal::ZERO
        {
            return Err(ConfigError::Invalid(
                "execution limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    /// Defaults mirror a $0-commission US equity brokerage account.
    fn default() -> Self {
        Self {
            account: Account {
                initial_capital: dec!(10000),
            },
            costs: CostConfig {
                commission_fixed: Decimal::ZERO,
                commission_pct: Decimal::ZERO,
                slippage_pct: dec!(0.05),
                sec_fee_rate: dec!(0.0000278),
                taf_fee_per_share: dec!(0.000166),
            },
            backtest: BacktestSettings {
                max_positions: 5,
                position_size_pct: dec!(20.0),
                risk_per_trade_pct: dec!(2.0),
                atr_multiplier: dec!(2.0),
            },
            execution: ExecutionSettings {
                max_position_size: dec!(10000),
                max_total_exposure: dec!(15000),
                polling_interval_secs: 60,
            },
            circuit_breaker: CircuitBreakerSettings {
                enabled: true,
                max_daily_loss: dec!(500),
                max_consecutive_losses: 3,
                max_trades_per_hour: 10,
            },
        }
    }
}
