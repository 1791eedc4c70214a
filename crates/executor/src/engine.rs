use crate::book::PositionBook;
use crate::error::ExecutionError;
use crate::orders::OrderStore;
use crate::trade_log::{FillRecord, TradeLog};
use broker::{Broker, BrokerError};
use chrono::{DateTime, Utc};
use configuration::{ExecutionSettings, Settings};
use core_types::{OrderSide, OrderStatus, Signal, SignalAction};
use risk::{BreakerStatus, CircuitBreaker};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Whether orders actually reach the brokerage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Orders "fill" at the quoted price with no broker call.
    Paper,
    /// Orders are submitted to the brokerage.
    Live,
}

/// Turns signals into at most one market order each, plus the bookkeeping
/// around it: position tracking, circuit-breaker feeding, order records,
/// and the daily trade log.
///
/// Every failure mode degrades to "skip this signal". Nothing here is fatal
/// and no broker failure leaves the book or the breaker half-updated.
pub struct ExecutionEngine {
    broker: Arc<dyn Broker>,
    limits: ExecutionSettings,
    mode: Mode,
    breaker: CircuitBreaker,
    book: PositionBook,
    orders: OrderStore,
    trade_log: Option<TradeLog>,
}

impl ExecutionEngine {
    /// Builds the engine and reconciles position state from the brokerage.
    ///
    /// Reconciliation failure is logged and leaves the book empty; it never
    /// prevents startup.
    pub async fn new(
        broker: Arc<dyn Broker>,
        settings: &Settings,
        mode: Mode,
        trade_log: Option<TradeLog>,
    ) -> Result<Self, ExecutionError> {
        let breaker = CircuitBreaker::new(settings.circuit_breaker.clone())?;
        let mut engine = Self {
            broker,
            limits: settings.execution.clone(),
            mode,
            breaker,
            book: PositionBook::new(),
            orders: OrderStore::new(),
            trade_log,
        };
        engine.reconcile().await;
        Ok(engine)
    }

    /// Seeds the internal book from the brokerage's reported holdings so a
    /// restart resumes with consistent position tracking.
    async fn reconcile(&mut self) {
        match self.broker.positions().await {
            Ok(holdings) => {
                for (ticker, holding) in &holdings {
                    let quantity = holding.quantity.floor().to_u64().unwrap_or(0);
                    self.book.seed(ticker, quantity, holding.average_buy_price);
                }
                tracing::info!(positions = holdings.len(), "position state reconciled");
            }
            Err(error) => {
                tracing::warn!(%error, "reconciliation failed, starting with an empty book");
            }
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn orders(&self) -> &OrderStore {
        &self.orders
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.breaker
    }

    /// Resets the circuit breaker at the start of a new trading session.
    pub fn reset_daily(&mut self) {
        self.breaker.reset_daily();
    }

    pub fn breaker_status(&self, now: DateTime<Utc>) -> BreakerStatus {
        self.breaker.status(now)
    }

    /// Processes one signal end to end. Returns the order record id when an
    /// order went out, `None` when the signal degraded to a no-op.
    pub async fn handle_signal(
        &mut self,
        now: DateTime<Utc>,
        signal: &Signal,
    ) -> Result<Option<Uuid>, ExecutionError> {
        let verdict = self.breaker.evaluate(now);
        if let risk::Verdict::Halted(reason) = verdict {
            tracing::warn!(ticker = signal.ticker, %reason, "signal dropped, trading halted");
            return Ok(None);
        }

        let price = match self.broker.last_trade_price(&signal.ticker).await {
            Ok(price) => price,
            Err(error) => {
                tracing::error!(ticker = signal.ticker, %error, "quote failed, skipping signal");
                return Ok(None);
            }
        };
        if price <= Decimal::ZERO {
            tracing::warn!(ticker = signal.ticker, %price, "non-positive quote, skipping signal");
            return Ok(None);
        }

        match signal.action {
            SignalAction::Buy => self.handle_buy(now, signal, price).await,
            SignalAction::Sell => {
                let broker_held = self.broker_quantity(&signal.ticker).await;
                let tracked = self.book.quantity(&signal.ticker);
                // Ordinary sells never exceed the smaller of the two views.
                let requested = signal.quantity.unwrap_or(tracked);
                let quantity = requested.min(broker_held.min(tracked));
                self.handle_sell(now, signal, price, quantity).await
            }
            SignalAction::Flat => {
                let broker_held = self.broker_quantity(&signal.ticker).await;
                let tracked = self.book.quantity(&signal.ticker);
                // Flatten clears the larger of the two views.
                let quantity = broker_held.max(tracked);
                self.handle_sell(now, signal, price, quantity).await
            }
        }
    }

    async fn handle_buy(
        &mut self,
        now: DateTime<Utc>,
        signal: &Signal,
        price: Decimal,
    ) -> Result<Option<Uuid>, ExecutionError> {
        let profile = match self.broker.portfolio_profile().await {
            Ok(profile) => profile,
            Err(error) => {
                tracing::error!(ticker = signal.ticker, %error, "portfolio snapshot failed, skipping buy");
                return Ok(None);
            }
        };

        let affordable = (profile.cash_available_for_trading / price)
            .floor()
            .to_u64()
            .unwrap_or(0);
        let quantity = match signal.quantity {
            Some(q) => q.min(affordable),
            None => {
                let target_notional = signal.notional.unwrap_or(self.limits.max_position_size);
                let sized = (target_notional / price).floor().to_u64().unwrap_or(0);
                sized.min(affordable)
            }
        };
        if quantity == 0 {
            tracing::info!(ticker = signal.ticker, %price, "buy sized to zero shares, skipping");
            return Ok(None);
        }

        let projected = profile.market_value + price * Decimal::from(quantity);
        if projected > self.limits.max_total_exposure {
            tracing::warn!(
                ticker = signal.ticker,
                %projected,
                limit = %self.limits.max_total_exposure,
                "buy rejected, exposure limit"
            );
            return Ok(None);
        }

        let Some(order_id) = self.submit(&signal.ticker, quantity, OrderSide::Buy).await else {
            return Ok(None);
        };

        let position = self.book.update_after_buy(&signal.ticker, quantity, price);
        let record_id = self.record_and_log(
            now,
            signal,
            order_id,
            OrderSide::Buy,
            quantity,
            price,
            Decimal::ZERO,
            position.quantity,
            position.avg_cost,
        )?;
        tracing::info!(
            ticker = signal.ticker,
            quantity,
            %price,
            position_quantity = position.quantity,
            "buy executed"
        );
        Ok(Some(record_id))
    }

    /// Submits a fully resolved sell. The caller has already clamped
    /// `quantity` against the broker and tracked views.
    async fn handle_sell(
        &mut self,
        now: DateTime<Utc>,
        signal: &Signal,
        price: Decimal,
        quantity: u64,
    ) -> Result<Option<Uuid>, ExecutionError> {
        if quantity == 0 {
            tracing::debug!(ticker = signal.ticker, "sell resolved to zero shares, skipping");
            return Ok(None);
        }

        let Some(order_id) = self.submit(&signal.ticker, quantity, OrderSide::Sell).await else {
            return Ok(None);
        };

        let (realized, position) = self.book.update_after_sell(&signal.ticker, quantity, price);
        self.breaker.record_trade(now, &signal.ticker, realized);
        let record_id = self.record_and_log(
            now,
            signal,
            order_id,
            OrderSide::Sell,
            quantity,
            price,
            realized,
            position.quantity,
            position.avg_cost,
        )?;
        tracing::info!(
            ticker = signal.ticker,
            quantity,
            %price,
            %realized,
            "sell executed"
        );
        Ok(Some(record_id))
    }

    /// Submits (or paper-fills) one market order. Returns the brokerage
    /// order id, `None` for paper fills or any submission failure.
    async fn submit(&self, ticker: &str, quantity: u64, side: OrderSide) -> Option<Option<String>> {
        match self.mode {
            Mode::Paper => Some(None),
            Mode::Live => match self.broker.submit_market_order(ticker, quantity, side).await {
                Ok(handle) => Some(Some(handle.order_id)),
                Err(error @ BrokerError::InvalidOrder(_)) => {
                    tracing::error!(ticker, quantity, %side, %error, "order rejected by brokerage");
                    None
                }
                Err(error @ BrokerError::Transport(_)) => {
                    tracing::error!(ticker, quantity, %side, %error, "order submission failed in transit");
                    None
                }
                Err(error) => {
                    tracing::error!(ticker, quantity, %side, %error, "unexpected order submission failure");
                    None
                }
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_and_log(
        &mut self,
        now: DateTime<Utc>,
        signal: &Signal,
        order_id: Option<String>,
        side: OrderSide,
        quantity: u64,
        price: Decimal,
        realized_pnl: Decimal,
        position_quantity: u64,
        position_avg_cost: Decimal,
    ) -> Result<Uuid, ExecutionError> {
        let status = if order_id.is_some() {
            OrderStatus::Submitted
        } else {
            OrderStatus::Filled
        };
        let record_id = self
            .orders
            .push(order_id, &signal.ticker, side, quantity, price, now, status);

        if let Some(log) = &mut self.trade_log {
            log.append(&FillRecord {
                timestamp: now,
                ticker: signal.ticker.clone(),
                side,
                quantity,
                price,
                reason: signal.reason.clone(),
                metadata: FillRecord::metadata_from_signal(signal),
                realized_pnl,
                position_quantity,
                position_avg_cost,
            })?;
        }
        Ok(record_id)
    }

    async fn broker_quantity(&self, ticker: &str) -> u64 {
        match self.broker.positions().await {
            Ok(holdings) => holdings
                .get(ticker)
                .and_then(|h| h.quantity.floor().to_u64())
                .unwrap_or(0),
            Err(error) => {
                tracing::warn!(ticker, %error, "holdings fetch failed, treating broker quantity as zero");
                0
            }
        }
    }

    /// Refreshes every non-terminal live order record from the brokerage.
    /// Per-record failures are logged and skipped.
    pub async fn poll_order_statuses(&mut self) {
        // Collected first so the broker calls don't hold a mutable borrow.
        let pending: Vec<(Uuid, String)> = self
            .orders
            .pollable_mut()
            .map(|r| (r.record_id, r.order_id.clone().unwrap_or_default()))
            .collect();

        for (record_id, order_id) in pending {
            match self.broker.order_status(&order_id).await {
                Ok(report) => {
                    if let Some(record) = self
                        .orders
                        .pollable_mut()
                        .find(|r| r.record_id == record_id)
                    {
                        tracing::debug!(order_id, status = ?report.status, "order status refreshed");
                        record.status = report.status;
                    }
                }
                Err(error) => {
                    tracing::warn!(order_id, %error, "order status poll failed");
                }
            }
        }
    }

    /// Force-closes every tracked position. Used before market close.
    pub async fn flatten_all(&mut self, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        let tickers: Vec<String> = self.book.tickers().cloned().collect();
        for ticker in tickers {
            let signal = Signal::new(ticker, SignalAction::Flat).with_reason("flatten_all");
            self.handle_signal(now, &signal).await?;
        }
        Ok(())
    }

    /// Cancels every open order on the account and marks local records.
    pub async fn cancel_open_orders(&mut self) -> Result<(), ExecutionError> {
        self.broker.cancel_open_orders().await?;
        self.orders.cancel_open();
        Ok(())
    }
}
