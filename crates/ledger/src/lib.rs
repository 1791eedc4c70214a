//! # Stockpilot Ledger Crate
//!
//! This crate provides the position ledger and the transaction-cost model.
//! The `Ledger` is the single owner of cash, per-ticker position state, the
//! trade history and the equity curve; the `CostModel` is a pure calculator
//! that determines the cost of a prospective trade without touching state.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** `CostModel` never mutates anything; the
//!   `Ledger` is the only state machine, and it mutates only after every
//!   precondition has passed. A trade that would violate an invariant is
//!   rejected before mutation, never rolled back.
//! - **Explicit rejection:** expected conditions (insufficient cash or
//!   shares) are surfaced as a `Rejection` value, forcing callers to handle
//!   the no-op path instead of relying on exception-style control flow.

pub mod cost;
pub mod error;
pub mod position;

mod book;

pub use book::Ledger;
pub use cost::CostModel;
pub use error::Rejection;
pub use position::Position;
