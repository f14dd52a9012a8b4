//! Adapter to the multi-type evaluation-provider contract used by application code.
//!
//! [`FlagProvider`] answers one `resolve_*_value` call per primitive type. Fallback values are
//! successful evaluations: only an unknown flag or a type mismatch sets an [`ErrorCode`], and only
//! [`ErrorStrategy::Fail`](crate::ErrorStrategy::Fail) flags return `Err`.
use std::collections::HashMap;

use serde::Serialize;

use crate::{
    eval::eval_details::screaming, EvaluationDetails, EvaluationError, EvaluationReason, Evaluator,
    FlagType, QueryOptions,
};

/// Evaluation context supplied by the application.
///
/// The targeting key is sent to the remote source as the user. The attributes `context` and
/// `payload` (strings) and `ignoreCache` (boolean) map to the same-named [`QueryOptions`]; other
/// attributes are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    pub targeting_key: Option<String>,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        EvaluationContext::default()
    }

    pub fn with_targeting_key(mut self, targeting_key: impl Into<String>) -> Self {
        self.targeting_key = Some(targeting_key.into());
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    fn string_attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .and_then(|value| value.as_str())
            .map(ToOwned::to_owned)
    }

    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            user: self.targeting_key.clone(),
            context: self.string_attribute("context"),
            payload: self.string_attribute("payload"),
            ignore_cache: self
                .attributes
                .get("ignoreCache")
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FlagNotFound,
    /// The flag is declared with another type than the one requested.
    TypeMismatch,
}

/// Name and other static information about a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub name: String,
}

/// Result of a provider evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvaluation<T> {
    pub value: T,
    /// `None` when the flag was not evaluated because of a type mismatch.
    pub details: Option<EvaluationDetails>,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    /// Serialized [`EvaluationReason`], e.g. `DISABLED`.
    pub reason: String,
}

impl<T> ProviderEvaluation<T> {
    /// Evaluation metadata as string key-value pairs.
    pub fn flag_metadata(&self) -> HashMap<String, String> {
        self.details
            .as_ref()
            .map(EvaluationDetails::to_string_map)
            .unwrap_or_default()
    }
}

/// Evaluation provider backed by an [`Evaluator`].
///
/// # Examples
/// ```
/// # use std::sync::Arc;
/// # use serde_json::json;
/// # use izanami_resolver::*;
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let declarations = FlagDeclarations::from_json(
///     r#"{"flags": [{"id": "turbo-mode", "valueType": "BOOLEAN", "defaultValue": false}]}"#,
/// )?;
/// let store = FlagConfigStore::from_declarations(declarations, &CallbackRegistry::new())?;
/// let transport = InMemoryTransport::new();
/// transport.set_result("turbo-mode", RawResult::Success(json!(true)));
///
/// let provider = FlagProvider::new(
///     EvaluatorConfig::new(Arc::new(store), Arc::new(transport)).to_evaluator(),
/// );
/// let evaluation = provider
///     .resolve_bool_value("turbo-mode", false, &EvaluationContext::new())
///     .await?;
/// assert!(evaluation.value);
/// assert_eq!(evaluation.reason, "ORIGIN_OR_CACHE");
/// # Ok::<(), Error>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FlagProvider {
    evaluator: Evaluator,
}

impl FlagProvider {
    pub const NAME: &'static str = "Izanami";

    pub fn new(evaluator: Evaluator) -> Self {
        FlagProvider { evaluator }
    }

    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: FlagProvider::NAME.to_owned(),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub async fn resolve_bool_value(
        &self,
        flag_key: &str,
        default_value: bool,
        context: &EvaluationContext,
    ) -> Result<ProviderEvaluation<bool>, EvaluationError> {
        self.resolve(flag_key, default_value, context).await
    }

    pub async fn resolve_string_value(
        &self,
        flag_key: &str,
        default_value: String,
        context: &EvaluationContext,
    ) -> Result<ProviderEvaluation<String>, EvaluationError> {
        self.resolve(flag_key, default_value, context).await
    }

    pub async fn resolve_int_value(
        &self,
        flag_key: &str,
        default_value: i64,
        context: &EvaluationContext,
    ) -> Result<ProviderEvaluation<i64>, EvaluationError> {
        self.resolve(flag_key, default_value, context).await
    }

    pub async fn resolve_float_value(
        &self,
        flag_key: &str,
        default_value: f64,
        context: &EvaluationContext,
    ) -> Result<ProviderEvaluation<f64>, EvaluationError> {
        self.resolve(flag_key, default_value, context).await
    }

    pub async fn resolve_struct_value(
        &self,
        flag_key: &str,
        default_value: serde_json::Value,
        context: &EvaluationContext,
    ) -> Result<ProviderEvaluation<serde_json::Value>, EvaluationError> {
        self.resolve(flag_key, default_value, context).await
    }

    async fn resolve<T: FlagType>(
        &self,
        flag_key: &str,
        default_value: T,
        context: &EvaluationContext,
    ) -> Result<ProviderEvaluation<T>, EvaluationError> {
        if let Some(config) = self.evaluator.store().resolve(flag_key) {
            if config.value_type != T::VALUE_TYPE {
                log::warn!(target: "izanami",
                           flag_key,
                           declared:debug = config.value_type,
                           requested:debug = T::VALUE_TYPE;
                           "flag requested with a type different from its declaration");
                return Ok(ProviderEvaluation {
                    value: default_value,
                    details: None,
                    error_code: Some(ErrorCode::TypeMismatch),
                    error_message: Some(format!(
                        "flag {flag_key:?} is declared as {:?}, requested as {:?}",
                        config.value_type,
                        T::VALUE_TYPE
                    )),
                    reason: screaming(&EvaluationReason::Error),
                });
            }
        }

        let result = self
            .evaluator
            .details::<T>(flag_key, &context.query_options())
            .await?;

        let (error_code, error_message) = match result.evaluation_reason() {
            EvaluationReason::FlagNotFound => (
                Some(ErrorCode::FlagNotFound),
                Some(format!("flag {flag_key:?} is not configured")),
            ),
            EvaluationReason::OriginOrCache
            | EvaluationReason::Disabled
            | EvaluationReason::Error => (None, None),
        };

        let reason = screaming(&result.evaluation_reason());
        Ok(ProviderEvaluation {
            value: result.value.unwrap_or(default_value),
            reason,
            details: Some(result.details),
            error_code,
            error_message,
        })
    }
}
