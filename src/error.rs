use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input shape: {0}")]
    InvalidInput(String),

    #[error("Overhead reconciliation violation: expected {expected}, allocated {allocated} (difference {difference})")]
    ReconciliationViolation {
        expected: f64,
        allocated: f64,
        difference: f64,
    },

    #[error("Total cost mismatch: total ({total}) != direct ({direct}) + overhead ({overhead}), difference {difference}")]
    TotalCostMismatch {
        total: f64,
        direct: f64,
        overhead: f64,
        difference: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CostingError>;
