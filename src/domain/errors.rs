use thiserror::Error;

/// Errors raised by the OPE domain: data validation, policies, estimators and
/// reward models.
#[derive(Debug, Error)]
pub enum OpeError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Invalid propensity score at round {index}: {value} (must be in (0, 1])")]
    InvalidPropensity { index: usize, value: f64 },

    #[error("Action {action} at round {index} is out of range for {n_actions} actions")]
    ActionOutOfRange {
        index: usize,
        action: usize,
        n_actions: usize,
    },

    #[error("Unknown counterfactual policy: {0}")]
    UnknownPolicy(String),

    #[error("Unknown estimator: {0}")]
    UnknownEstimator(String),

    #[error("Unknown base model: {0}")]
    UnknownBaseModel(String),

    #[error("Bandit feedback is empty")]
    EmptyFeedback,

    #[error("{estimator} requires estimated rewards from a regression model")]
    MissingEstimatedRewards { estimator: String },

    #[error("Ground-truth policy value is zero; relative error is undefined")]
    ZeroGroundTruth,

    #[error("Regression failed: {reason}")]
    Regression { reason: String },
}

impl OpeError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        OpeError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn shape(what: &'static str, expected: impl ToString, actual: impl ToString) -> Self {
        OpeError::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type OpeResult<T> = Result<T, OpeError>;
