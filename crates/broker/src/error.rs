use thiserror::Error;

/// Failures surfaced by a brokerage wrapper.
///
/// The execution engine distinguishes these kinds only for logging; every
/// variant means "the order was not placed" as far as the ledger is
/// concerned.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("invalid order parameters: {0}")]
    InvalidOrder(String),

    #[error("brokerage transport error: {0}")]
    Transport(String),

    #[error("failed to parse brokerage response: {0}")]
    Parse(String),
}
