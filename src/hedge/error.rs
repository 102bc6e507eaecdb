/// Caller-visible rejections of malformed hedge parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HedgeError {
    #[error("Budget must be positive, got ${0:.2}")]
    InvalidBudget(f64),

    #[error("Exit threshold must be between 0 and 1, got {0}")]
    InvalidExitThreshold(f64),

    #[error("Fee per contract must be non-negative, got ${0}")]
    InvalidFee(f64),

    #[error("Group {0} not found")]
    GroupNotFound(String),
}
