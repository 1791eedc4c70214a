//! # Stockpilot Executor Crate
//!
//! The live/paper execution path: signals in, at most one market order out,
//! with independent position bookkeeping, circuit-breaker feeding, order
//! records with status polling, and the daily trade log.
//!
//! The `ExecutionEngine` tracks positions on its own, separate from the
//! backtest ledger, because live state must survive process restarts: it is
//! reconciled from the brokerage at startup rather than replayed.

pub mod book;
pub mod engine;
pub mod error;
pub mod orders;
pub mod trade_log;

pub use book::{PositionBook, TrackedPosition};
pub use engine::{ExecutionEngine, Mode};
pub use error::ExecutionError;
pub use orders::{OrderRecord, OrderStore};
pub use trade_log::{FillRecord, TradeLog};
