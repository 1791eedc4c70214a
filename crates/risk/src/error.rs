use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("invalid risk parameters: {0}")]
    InvalidParameters(String),
}
