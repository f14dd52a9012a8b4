use serde::{Deserialize, Serialize};

use crate::{EvaluationError, ErrorStrategy, FlagValue, RawResult, ValueType};

use super::fallback::FallbackResolver;

/// Where an evaluated value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueSource {
    /// The value was computed by the remote source (or served from its cache).
    Remote,
    /// The remote source failed and applied its own error strategy.
    RemoteErrorStrategy,
    /// The value was substituted locally according to the flag's [`ErrorStrategy`].
    ApplicationErrorStrategy,
}

/// Why a value was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
    OriginOrCache,
    Disabled,
    Error,
    FlagNotFound,
}

impl ValueSource {
    /// Return `true` if `reason` may accompany a value from this source.
    pub fn admits(self, reason: EvaluationReason) -> bool {
        match self {
            ValueSource::Remote => matches!(
                reason,
                EvaluationReason::OriginOrCache | EvaluationReason::Disabled
            ),
            ValueSource::RemoteErrorStrategy => reason == EvaluationReason::Error,
            ValueSource::ApplicationErrorStrategy => matches!(
                reason,
                EvaluationReason::Disabled
                    | EvaluationReason::Error
                    | EvaluationReason::FlagNotFound
            ),
        }
    }
}

/// Value of one evaluation tagged with its provenance.
///
/// `value` is `None` when the flag evaluates to its type's null representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome<T> {
    pub value: Option<T>,
    pub source: ValueSource,
    pub reason: EvaluationReason,
}

impl<T> EvaluationOutcome<T> {
    pub(crate) fn new(value: Option<T>, source: ValueSource, reason: EvaluationReason) -> Self {
        debug_assert!(
            source.admits(reason),
            "{source:?} cannot be combined with {reason:?}"
        );
        EvaluationOutcome {
            value,
            source,
            reason,
        }
    }

    /// Map the value using `f`, treating `None` from `f` as a null value.
    pub fn and_then<T2, F: FnOnce(T) -> Option<T2>>(self, f: F) -> EvaluationOutcome<T2> {
        EvaluationOutcome {
            value: self.value.and_then(f),
            source: self.source,
            reason: self.reason,
        }
    }
}

/// Compute the outcome of one flag evaluation from the remote source's answer.
///
/// Returns `Err` only when the flag's strategy is [`ErrorStrategy::Fail`] and the remote source
/// was unavailable or reported an error. Every other condition produces an outcome.
pub(crate) async fn compute_outcome(
    raw: RawResult,
    fallback: &FallbackResolver<'_>,
    requested: ValueType,
) -> Result<EvaluationOutcome<FlagValue>, EvaluationError> {
    match raw {
        RawResult::Unavailable(cause) => {
            log::warn!(target: "izanami",
                       flag_id = fallback.flag_id();
                       "remote source is unavailable: {cause}");
            application_fallback(fallback, requested, EvaluationError::RemoteUnavailable(cause))
                .await
        }

        RawResult::Error { cause, value } => {
            log::warn!(target: "izanami",
                       flag_id = fallback.flag_id();
                       "remote source reported an error: {cause}");
            if fallback.strategy() == ErrorStrategy::Fail {
                return Err(EvaluationError::RemoteReportedError(cause));
            }

            match FlagValue::extract(&value, requested) {
                Ok(value) => Ok(EvaluationOutcome::new(
                    value,
                    ValueSource::RemoteErrorStrategy,
                    EvaluationReason::Error,
                )),
                Err(err) => Ok(extraction_fallback(fallback, requested, err).await),
            }
        }

        RawResult::Success(value) => match FlagValue::extract(&value, requested) {
            Ok(value) if is_disabled(value.as_ref(), requested) => {
                Ok(disabled_outcome(fallback, requested))
            }
            Ok(value) => Ok(EvaluationOutcome::new(
                value,
                ValueSource::Remote,
                EvaluationReason::OriginOrCache,
            )),
            Err(err) => Ok(extraction_fallback(fallback, requested, err).await),
        },
    }
}

/// The remote source's representation of a disabled feature: `false` for booleans, `null` for
/// every other type.
fn is_disabled(value: Option<&FlagValue>, requested: ValueType) -> bool {
    match requested {
        ValueType::Boolean => matches!(value, None | Some(FlagValue::Boolean(false))),
        ValueType::String | ValueType::Integer | ValueType::Double | ValueType::Object => {
            value.is_none()
        }
    }
}

fn disabled_outcome(
    fallback: &FallbackResolver<'_>,
    requested: ValueType,
) -> EvaluationOutcome<FlagValue> {
    // `false` is already the business answer for a disabled boolean feature.
    if requested == ValueType::Boolean {
        return EvaluationOutcome::new(
            Some(FlagValue::Boolean(false)),
            ValueSource::Remote,
            EvaluationReason::Disabled,
        );
    }

    match fallback.configured_default(requested) {
        Some(default) => {
            log::info!(target: "izanami",
                       flag_id = fallback.flag_id(),
                       default:serde = default;
                       "flag is disabled, using configured default value");
            EvaluationOutcome::new(
                Some(default),
                ValueSource::ApplicationErrorStrategy,
                EvaluationReason::Disabled,
            )
        }
        None => EvaluationOutcome::new(None, ValueSource::Remote, EvaluationReason::Disabled),
    }
}

async fn application_fallback(
    fallback: &FallbackResolver<'_>,
    requested: ValueType,
    error: EvaluationError,
) -> Result<EvaluationOutcome<FlagValue>, EvaluationError> {
    if fallback.strategy() == ErrorStrategy::Fail {
        return Err(error);
    }

    Ok(EvaluationOutcome::new(
        fallback.resolve(requested, error).await,
        ValueSource::ApplicationErrorStrategy,
        EvaluationReason::Error,
    ))
}

/// A value that cannot be converted to the requested type is a local data problem, not a remote
/// outage, so it is never returned as an error, whatever the strategy.
async fn extraction_fallback(
    fallback: &FallbackResolver<'_>,
    requested: ValueType,
    error: EvaluationError,
) -> EvaluationOutcome<FlagValue> {
    log::warn!(target: "izanami",
               flag_id = fallback.flag_id();
               "{error}");

    let value = match fallback.strategy() {
        ErrorStrategy::Fail => Some(FlagValue::zero(requested)),
        ErrorStrategy::DefaultValue | ErrorStrategy::NullValue | ErrorStrategy::Callback => {
            fallback.resolve(requested, error).await
        }
    };

    EvaluationOutcome::new(
        value,
        ValueSource::ApplicationErrorStrategy,
        EvaluationReason::Error,
    )
}
