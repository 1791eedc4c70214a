//! # Stockpilot Analytics Crate
//!
//! Turns an equity time series into a performance-metrics summary. The
//! calculation is a pure function of its input: recomputing from the same
//! equity curve always yields bit-identical output, and nothing here holds
//! state between calls.

pub mod engine;
pub mod report;

pub use report::PerformanceMetrics;
