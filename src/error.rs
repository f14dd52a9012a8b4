use thiserror::Error;

use crate::{ErrorStrategy, ValueType};

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type of the crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("remote source did not become ready in time")]
    NotReady,
}

/// Invalid declarative input. Raised while building the flag configuration store and never
/// recovered from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("flag {flag:?}: default value {value} is not a valid {expected:?}")]
    InvalidDefaultValue {
        flag: String,
        expected: ValueType,
        value: String,
    },
    #[error("flag {flag:?}: default value is set but error strategy is {strategy:?}")]
    DefaultValueWithoutDefaultStrategy {
        flag: String,
        strategy: ErrorStrategy,
    },
    #[error("flag {flag:?}: callback is set but error strategy is {strategy:?}")]
    CallbackWithoutCallbackStrategy {
        flag: String,
        strategy: ErrorStrategy,
    },
    #[error("error parsing flag declarations: {0}")]
    Parse(String),
}

/// Conditions that interrupt a flag evaluation.
///
/// Only [`EvaluationError::RemoteUnavailable`] and [`EvaluationError::RemoteReportedError`] are
/// ever returned to callers, and only for flags configured with [`ErrorStrategy::Fail`].
/// [`EvaluationError::Extraction`] is only passed to error callbacks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("remote source is unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("remote source reported an error: {0}")]
    RemoteReportedError(String),
    #[error("unable to extract {expected:?} value: {reason}")]
    Extraction { expected: ValueType, reason: String },
}
