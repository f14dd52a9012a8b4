use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{ErrorStrategy, FlagConfig, ValueType};

use super::outcome::{EvaluationOutcome, EvaluationReason, ValueSource};

/// Static description of the flag behind an evaluation.
///
/// Config fields are `None` when the requested identifier is not configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagMetadata {
    /// Identifier as supplied by the caller (key or name).
    pub identifier: String,
    pub config_key: Option<String>,
    pub config_name: Option<String>,
    pub description: Option<String>,
    pub declared_type: Option<ValueType>,
    pub default_value_as_string: Option<String>,
    pub error_strategy: Option<ErrorStrategy>,
}

impl FlagMetadata {
    pub(crate) fn for_config(identifier: &str, config: &FlagConfig) -> FlagMetadata {
        FlagMetadata {
            identifier: identifier.to_owned(),
            config_key: Some(config.id.clone()),
            config_name: config.name.clone(),
            description: Some(config.description.clone()),
            declared_type: Some(config.value_type),
            default_value_as_string: config.default_value.as_ref().map(ToString::to_string),
            error_strategy: Some(config.error_strategy),
        }
    }

    pub(crate) fn not_found(identifier: &str) -> FlagMetadata {
        FlagMetadata {
            identifier: identifier.to_owned(),
            config_key: None,
            config_name: None,
            description: None,
            declared_type: None,
            default_value_as_string: None,
            error_strategy: None,
        }
    }
}

/// Details about a single flag evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetails {
    #[serde(flatten)]
    pub metadata: FlagMetadata,
    pub value_source: ValueSource,
    pub evaluation_reason: EvaluationReason,
    /// Timestamp when the outcome was computed.
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationDetails {
    /// Flatten into string key-value pairs, as expected by evaluation-provider metadata.
    pub fn to_string_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                map.insert(key.to_owned(), value);
            }
        };

        let metadata = &self.metadata;
        put("configKey", metadata.config_key.clone());
        put("configName", metadata.config_name.clone());
        put("description", metadata.description.clone());
        put("declaredType", metadata.declared_type.map(|it| screaming(&it)));
        put("defaultValueAsString", metadata.default_value_as_string.clone());
        put("errorStrategy", metadata.error_strategy.map(|it| screaming(&it)));
        put("valueSource", Some(screaming(&self.value_source)));
        put("evaluationReason", Some(screaming(&self.evaluation_reason)));

        map
    }
}

/// Serialized name of a unit enum variant, e.g. `APPLICATION_ERROR_STRATEGY`.
pub(crate) fn screaming<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

/// An evaluated value along with the details of its evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResultWithDetails<T> {
    /// `None` is the null value.
    pub value: Option<T>,
    pub details: EvaluationDetails,
}

impl<T> EvaluationResultWithDetails<T> {
    pub(crate) fn new(outcome: EvaluationOutcome<T>, metadata: FlagMetadata) -> Self {
        EvaluationResultWithDetails {
            value: outcome.value,
            details: EvaluationDetails {
                metadata,
                value_source: outcome.source,
                evaluation_reason: outcome.reason,
                evaluated_at: Utc::now(),
            },
        }
    }

    /// Map `value` using `f`, treating `None` from `f` as a null value.
    pub fn and_then<T2, F: FnOnce(T) -> Option<T2>>(self, f: F) -> EvaluationResultWithDetails<T2> {
        EvaluationResultWithDetails {
            value: self.value.and_then(f),
            details: self.details,
        }
    }

    pub fn value_source(&self) -> ValueSource {
        self.details.value_source
    }

    pub fn evaluation_reason(&self) -> EvaluationReason {
        self.details.evaluation_reason
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EvaluationResultWithDetails, FlagMetadata};
    use crate::{
        declaration::FlagDeclaration,
        eval::outcome::{EvaluationOutcome, EvaluationReason, ValueSource},
        CallbackRegistry, ErrorStrategy, FlagConfig, FlagValue, ValueType,
    };

    fn result() -> EvaluationResultWithDetails<FlagValue> {
        let config = FlagConfig::from_declaration(
            FlagDeclaration {
                id: "discount-rate".to_owned(),
                name: Some("discount".to_owned()),
                description: "Checkout discount".to_owned(),
                value_type: ValueType::Double,
                error_strategy: ErrorStrategy::DefaultValue,
                default_value: Some(json!(0.5)),
                callback: None,
            },
            &CallbackRegistry::new(),
        )
        .unwrap();

        EvaluationResultWithDetails::new(
            EvaluationOutcome::new(
                Some(FlagValue::Double(0.5)),
                ValueSource::ApplicationErrorStrategy,
                EvaluationReason::Error,
            ),
            FlagMetadata::for_config("discount", &config),
        )
    }

    #[test]
    fn string_map_uses_wire_names() {
        let map = result().details.to_string_map();

        assert_eq!(map["configKey"], "discount-rate");
        assert_eq!(map["configName"], "discount");
        assert_eq!(map["declaredType"], "DOUBLE");
        assert_eq!(map["defaultValueAsString"], "0.5");
        assert_eq!(map["errorStrategy"], "DEFAULT_VALUE");
        assert_eq!(map["valueSource"], "APPLICATION_ERROR_STRATEGY");
        assert_eq!(map["evaluationReason"], "ERROR");
    }

    #[test]
    fn serializes_flattened_metadata() {
        let json = serde_json::to_value(result()).unwrap();

        assert_eq!(json["value"], json!(0.5));
        assert_eq!(json["details"]["identifier"], json!("discount"));
        assert_eq!(json["details"]["configKey"], json!("discount-rate"));
        assert_eq!(json["details"]["valueSource"], json!("APPLICATION_ERROR_STRATEGY"));
    }

    #[test]
    fn not_found_metadata_has_no_config_fields() {
        let metadata = FlagMetadata::not_found("nope");

        assert_eq!(metadata.identifier, "nope");
        assert_eq!(metadata.config_key, None);
        assert_eq!(metadata.error_strategy, None);
    }

    #[test]
    fn and_then_keeps_details() {
        let typed = result().and_then(|value| value.as_double());

        assert_eq!(typed.value, Some(0.5));
        assert_eq!(typed.value_source(), ValueSource::ApplicationErrorStrategy);
        assert_eq!(typed.evaluation_reason(), EvaluationReason::Error);
    }
}
