use crate::{CallbackRequest, ErrorStrategy, EvaluationError, FlagConfig, FlagValue, ValueType};

/// Produces type-safe fallback values for one flag according to its [`ErrorStrategy`].
pub(crate) struct FallbackResolver<'a> {
    config: &'a FlagConfig,
}

impl<'a> FallbackResolver<'a> {
    pub fn new(config: &'a FlagConfig) -> FallbackResolver<'a> {
        FallbackResolver { config }
    }

    pub fn flag_id(&self) -> &str {
        &self.config.id
    }

    pub fn strategy(&self) -> ErrorStrategy {
        self.config.error_strategy
    }

    /// The configured default value converted to `requested`, if the flag has one.
    pub fn configured_default(&self, requested: ValueType) -> Option<FlagValue> {
        match self.config.error_strategy {
            ErrorStrategy::DefaultValue => self
                .config
                .default_value
                .as_ref()
                .map(|value| value.coerce(requested)),
            ErrorStrategy::NullValue | ErrorStrategy::Fail | ErrorStrategy::Callback => None,
        }
    }

    /// Fallback value for an evaluation interrupted by `trigger`. `None` is the null value.
    ///
    /// Must not be called for [`ErrorStrategy::Fail`], the trigger has to be returned to the
    /// caller instead.
    pub async fn resolve(&self, requested: ValueType, trigger: EvaluationError) -> Option<FlagValue> {
        match self.config.error_strategy {
            ErrorStrategy::DefaultValue => Some(
                self.configured_default(requested)
                    .unwrap_or_else(|| FlagValue::zero(requested)),
            ),

            ErrorStrategy::NullValue => None,

            ErrorStrategy::Fail => {
                debug_assert!(false, "fallback should never be resolved for FAIL strategy");
                Some(FlagValue::zero(requested))
            }

            ErrorStrategy::Callback => {
                let Some(callback) = self
                    .config
                    .callback
                    .as_ref()
                    .and_then(|it| it.callback.clone())
                else {
                    return Some(FlagValue::zero(requested));
                };

                let value = callback
                    .on_error(CallbackRequest {
                        flag_id: self.config.id.clone(),
                        error: trigger,
                        requested_type: requested,
                        declared_type: self.config.value_type,
                    })
                    .await;

                Some(
                    FlagValue::from_json(value)
                        .map(|value| value.coerce(requested))
                        .unwrap_or_else(|| FlagValue::zero(requested)),
                )
            }
        }
    }
}
