//! # Stockpilot Risk Crate
//!
//! An independent risk gate that observes realized trade outcomes and trade
//! frequency, and decides whether new orders may be submitted. The breaker
//! owns its own state; it never looks inside the ledger.

pub mod circuit_breaker;
pub mod error;

pub use circuit_breaker::{BreakerStatus, CircuitBreaker, TradeOutcome, TripReason, Verdict};
pub use error::RiskError;
