use crate::error::RiskError;
use chrono::{DateTime, Duration, Utc};
use configuration::CircuitBreakerSettings;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Why the breaker halted trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    DailyLossLimit,
    ConsecutiveLosses,
    TradeFrequencyLimit,
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripReason::DailyLossLimit => write!(f, "daily_loss_limit"),
            TripReason::ConsecutiveLosses => write!(f, "consecutive_losses"),
            TripReason::TradeFrequencyLimit => write!(f, "trade_frequency_limit"),
        }
    }
}

/// The breaker's answer to "may this order go out?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Halted(TripReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Record of one realized trade outcome, kept for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub realized_pnl: Decimal,
}

/// Snapshot of the breaker state for logging and reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub enabled: bool,
    pub tripped: bool,
    pub trip_reason: Option<TripReason>,
    pub daily_pnl: Decimal,
    pub consecutive_losses: u32,
    pub trades_last_hour: usize,
}

const TRADE_HISTORY_CAP: usize = 1000;
const RECENT_TRADES_CAP: usize = 100;

/// Monitors realized trade outcomes and trade frequency, halting new trades
/// after a loss or frequency threshold is breached.
///
/// Transitions are one-way within a trading day: once tripped, only
/// `reset_daily` (start of a new session) returns the breaker to normal.
pub struct CircuitBreaker {
    settings: CircuitBreakerSettings,
    daily_pnl: Decimal,
    consecutive_losses: u32,
    tripped: Option<TripReason>,
    trade_history: VecDeque<TradeOutcome>,
    recent_trades: VecDeque<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitBreakerSettings) -> Result<Self, RiskError> {
        if settings.max_daily_loss <= Decimal::ZERO {
            return Err(RiskError::InvalidParameters(
                "max_daily_loss must be positive".to_string(),
            ));
        }
        if settings.max_consecutive_losses == 0 {
            return Err(RiskError::InvalidParameters(
                "max_consecutive_losses must be at least 1".to_string(),
            ));
        }
        if settings.max_trades_per_hour == 0 {
            return Err(RiskError::InvalidParameters(
                "max_trades_per_hour must be at least 1".to_string(),
            ));
        }

        tracing::info!(
            max_daily_loss = %settings.max_daily_loss,
            max_consecutive_losses = settings.max_consecutive_losses,
            max_trades_per_hour = settings.max_trades_per_hour,
            enabled = settings.enabled,
            "circuit breaker initialized"
        );

        Ok(Self {
            settings,
            daily_pnl: Decimal::ZERO,
            consecutive_losses: 0,
            tripped: None,
            trade_history: VecDeque::new(),
            recent_trades: VecDeque::new(),
        })
    }

    /// Records a realized trade outcome and re-checks the loss limits.
    ///
    /// A zero-P&L trade counts as a win for streak purposes: any
    /// non-negative outcome resets the consecutive-loss counter.
    pub fn record_trade(&mut self, now: DateTime<Utc>, ticker: &str, realized_pnl: Decimal) {
        if !self.settings.enabled {
            return;
        }

        if self.trade_history.len() == TRADE_HISTORY_CAP {
            self.trade_history.pop_front();
        }
        self.trade_history.push_back(TradeOutcome {
            timestamp: now,
            ticker: ticker.to_string(),
            realized_pnl,
        });
        if self.recent_trades.len() == RECENT_TRADES_CAP {
            self.recent_trades.pop_front();
        }
        self.recent_trades.push_back(now);

        self.daily_pnl += realized_pnl;

        if realized_pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
            tracing::info!(
                ticker,
                %realized_pnl,
                consecutive_losses = self.consecutive_losses,
                daily_pnl = %self.daily_pnl,
                "losing trade recorded"
            );
        } else {
            if self.consecutive_losses > 0 {
                tracing::info!(ticker, %realized_pnl, "loss streak broken");
            }
            self.consecutive_losses = 0;
        }

        self.check_loss_limits();
    }

    /// Evaluates whether a new order may be submitted right now.
    ///
    /// This is a query with a side effect: the trailing-hour frequency limit
    /// is checked lazily here, and exceeding it trips the breaker as part of
    /// the read. That keeps it safe to call before every order without a
    /// separate bookkeeping step.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Verdict {
        if !self.settings.enabled {
            return Verdict::Allow;
        }
        if let Some(reason) = self.tripped {
            return Verdict::Halted(reason);
        }

        let recent = self.trades_last_hour(now);
        if recent >= self.settings.max_trades_per_hour {
            tracing::warn!(
                trades_last_hour = recent,
                limit = self.settings.max_trades_per_hour,
                "trade frequency limit exceeded"
            );
            self.trip(TripReason::TradeFrequencyLimit);
            return Verdict::Halted(TripReason::TradeFrequencyLimit);
        }

        Verdict::Allow
    }

    /// Convenience predicate over [`CircuitBreaker::evaluate`].
    pub fn can_trade(&mut self, now: DateTime<Utc>) -> bool {
        self.evaluate(now).is_allowed()
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.is_some()
    }

    pub fn trip_reason(&self) -> Option<TripReason> {
        self.tripped
    }

    /// Resets daily counters at the start of a new trading session. The
    /// outcome history is kept for audit; the recent-trade window is cleared.
    pub fn reset_daily(&mut self) {
        tracing::info!(
            previous_daily_pnl = %self.daily_pnl,
            previous_consecutive_losses = self.consecutive_losses,
            "resetting circuit breaker for new trading day"
        );
        self.daily_pnl = Decimal::ZERO;
        self.consecutive_losses = 0;
        self.tripped = None;
        self.recent_trades.clear();
    }

    pub fn status(&self, now: DateTime<Utc>) -> BreakerStatus {
        BreakerStatus {
            enabled: self.settings.enabled,
            tripped: self.tripped.is_some(),
            trip_reason: self.tripped,
            daily_pnl: self.daily_pnl,
            consecutive_losses: self.consecutive_losses,
            trades_last_hour: self.trades_last_hour(now),
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &TradeOutcome> {
        self.trade_history.iter()
    }

    fn trades_last_hour(&self, now: DateTime<Utc>) -> usize {
        let window_start = now - Duration::hours(1);
        self.recent_trades
            .iter()
            .filter(|t| **t >= window_start)
            .count()
    }

    fn check_loss_limits(&mut self) {
        if self.tripped.is_some() {
            return;
        }
        if self.daily_pnl <= -self.settings.max_daily_loss.abs() {
            tracing::error!(
                daily_pnl = %self.daily_pnl,
                limit = %self.settings.max_daily_loss,
                "daily loss limit exceeded"
            );
            self.trip(TripReason::DailyLossLimit);
            return;
        }
        if self.consecutive_losses >= self.settings.max_consecutive_losses {
            tracing::error!(
                consecutive_losses = self.consecutive_losses,
                limit = self.settings.max_consecutive_losses,
                "too many consecutive losses"
            );
            self.trip(TripReason::ConsecutiveLosses);
        }
    }

    fn trip(&mut self, reason: TripReason) {
        self.tripped = Some(reason);
        tracing::error!(%reason, "circuit breaker tripped, trading halted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn settings() -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            enabled: true,
            max_daily_loss: dec!(500),
            max_consecutive_losses: 3,
            max_trades_per_hour: 10,
        }
    }

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap() + Duration::minutes(min)
    }

    #[test]
    fn rejects_zero_thresholds() {
        let mut bad = settings();
        bad.max_consecutive_losses = 0;
        assert!(CircuitBreaker::new(bad).is_err());
    }

    #[test]
    fn three_consecutive_losses_trip_the_breaker() {
        let mut breaker = CircuitBreaker::new(settings()).unwrap();
        for i in 0..3 {
            breaker.record_trade(t(i), "TQQQ", dec!(-10));
        }
        assert_eq!(breaker.trip_reason(), Some(TripReason::ConsecutiveLosses));
        assert!(!breaker.can_trade(t(4)));

        breaker.reset_daily();
        assert!(breaker.can_trade(t(5)));
        assert_eq!(breaker.trip_reason(), None);
    }

    #[test]
    fn winning_trade_resets_the_streak() {
        let mut breaker = CircuitBreaker::new(settings()).unwrap();
        breaker.record_trade(t(0), "TQQQ", dec!(-10));
        breaker.record_trade(t(1), "TQQQ", dec!(-10));
        // Zero P&L counts as a win for streak purposes.
        breaker.record_trade(t(2), "TQQQ", Decimal::ZERO);
        breaker.record_trade(t(3), "TQQQ", dec!(-10));
        assert!(breaker.can_trade(t(4)));
    }

    #[test]
    fn daily_loss_at_exact_limit_trips() {
        let mut breaker = CircuitBreaker::new(settings()).unwrap();
        breaker.record_trade(t(0), "SQQQ", dec!(-200));
        breaker.record_trade(t(1), "SQQQ", dec!(100));
        breaker.record_trade(t(2), "SQQQ", dec!(-400));
        assert_eq!(breaker.trip_reason(), Some(TripReason::DailyLossLimit));
    }

    #[test]
    fn frequency_limit_trips_lazily_on_evaluate() {
        let mut breaker = CircuitBreaker::new(settings()).unwrap();
        for i in 0..10 {
            breaker.record_trade(t(i), "SPY", dec!(1));
        }
        // Recording alone does not trip; the query does.
        assert!(!breaker.is_tripped());
        assert_eq!(
            breaker.evaluate(t(11)),
            Verdict::Halted(TripReason::TradeFrequencyLimit)
        );
        assert!(breaker.is_tripped());
    }

    #[test]
    fn frequency_window_is_trailing_sixty_minutes() {
        let mut breaker = CircuitBreaker::new(settings()).unwrap();
        for i in 0..10 {
            breaker.record_trade(t(i), "SPY", dec!(1));
        }
        // Ninety minutes later every recorded trade is outside the window.
        assert_eq!(breaker.evaluate(t(100)), Verdict::Allow);
    }

    #[test]
    fn disabled_breaker_always_allows() {
        let mut off = settings();
        off.enabled = false;
        let mut breaker = CircuitBreaker::new(off).unwrap();
        for i in 0..50 {
            breaker.record_trade(t(i), "SPY", dec!(-100));
        }
        assert!(breaker.can_trade(t(51)));
    }

    #[test]
    fn reset_keeps_audit_history() {
        let mut breaker = CircuitBreaker::new(settings()).unwrap();
        breaker.record_trade(t(0), "SPY", dec!(-600));
        assert!(breaker.is_tripped());
        breaker.reset_daily();
        assert_eq!(breaker.history().count(), 1);
        assert_eq!(breaker.status(t(1)).trades_last_hour, 0);
    }
}
