use broker::BrokerError;
use risk::RiskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("risk configuration rejected: {0}")]
    Risk(#[from] RiskError),

    #[error("broker call failed: {0}")]
    Broker(#[from] BrokerError),

    #[error("trade log write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("trade log io failed: {0}")]
    Io(#[from] std::io::Error),
}
