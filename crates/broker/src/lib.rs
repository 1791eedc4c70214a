//! # Stockpilot Broker Crate
//!
//! The brokerage collaborator interface. Concrete wrappers (authentication,
//! HTTP plumbing, response parsing) live outside this system; everything here
//! is the capability set the execution engine consumes, expressed as an
//! async trait so live and test implementations are interchangeable.

pub mod error;

pub use error::BrokerError;

use async_trait::async_trait;
use core_types::{OrderSide, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One held instrument as the brokerage reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Brokerages may report fractional share quantities.
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
    pub market_value: Decimal,
}

/// Account-level snapshot used for exposure checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioProfile {
    /// Total market value of all held positions.
    pub market_value: Decimal,
    pub cash_available_for_trading: Decimal,
    pub cash_available_for_withdrawal: Decimal,
}

/// Receipt for a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub order_id: String,
}

/// Result of polling an order's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
}

/// The capability set consumed from a brokerage.
///
/// All calls are synchronous request/response from the caller's point of
/// view and may fail with a transport or parsing error; callers catch per
/// call and treat any failure as "skip this action".
#[async_trait]
pub trait Broker: Send + Sync {
    /// Latest trade price for a ticker.
    async fn last_trade_price(&self, ticker: &str) -> Result<Decimal, BrokerError>;

    /// All current holdings, keyed by ticker.
    async fn positions(&self) -> Result<HashMap<String, Holding>, BrokerError>;

    /// Account-level value and cash snapshot.
    async fn portfolio_profile(&self) -> Result<PortfolioProfile, BrokerError>;

    /// Submits a market order and returns its handle.
    async fn submit_market_order(
        &self,
        ticker: &str,
        quantity: u64,
        side: OrderSide,
    ) -> Result<OrderHandle, BrokerError>;

    /// Polls the current status of a previously submitted order.
    async fn order_status(&self, order_id: &str) -> Result<OrderStatusReport, BrokerError>;

    /// Cancels every open order on the account.
    async fn cancel_open_orders(&self) -> Result<(), BrokerError>;
}
