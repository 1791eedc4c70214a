pub mod enums;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{OrderSide, OrderStatus, SignalAction};
pub use structs::{EquityPoint, Signal, Trade};
