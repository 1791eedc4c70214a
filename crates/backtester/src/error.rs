use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("no price bars to replay")]
    NoData,

    #[error("bar timestamps must be strictly increasing: {prev} then {next}")]
    NonMonotonicBars {
        prev: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    #[error("failed to read bar data: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error while reading bar data: {0}")]
    Io(#[from] std::io::Error),

    #[error("unparseable bar timestamp: {0}")]
    InvalidTimestamp(String),
}
