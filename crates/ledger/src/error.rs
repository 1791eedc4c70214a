use thiserror::Error;

/// A trade the ledger refused to apply. These are expected, locally handled
/// conditions, not failures: the caller logs and drops the request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("trade quantity must be positive")]
    NonPositiveQuantity,

    #[error("trade price must be positive, got {0}")]
    NonPositivePrice(rust_decimal::Decimal),

    #[error("insufficient cash: need {required}, have {available}")]
    InsufficientCash {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("insufficient shares of {ticker}: have {held}, tried to sell {requested}")]
    InsufficientShares {
        ticker: String,
        held: u64,
        requested: u64,
    },
}
