use serde::{Deserialize, Serialize};

use crate::{ConfigurationError, ErrorStrategy, ValueType};

/// Declarative flag input, usually loaded from a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDeclarations {
    #[serde(default)]
    pub flags: Vec<FlagDeclaration>,
}

impl FlagDeclarations {
    /// Parse declarations from a JSON document of the form `{"flags": [...]}`.
    pub fn from_json(json: &str) -> Result<FlagDeclarations, ConfigurationError> {
        serde_json::from_str(json).map_err(|err| ConfigurationError::Parse(err.to_string()))
    }
}

/// Unvalidated declaration of a single flag.
///
/// `default_value` is kept as raw JSON, it is converted to `value_type` when the
/// [`FlagConfig`](crate::FlagConfig) is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDeclaration {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub error_strategy: ErrorStrategy,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    /// Name of a callback in the [`CallbackRegistry`](crate::CallbackRegistry).
    #[serde(default)]
    pub callback: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::FlagDeclarations;
    use crate::{ConfigurationError, ErrorStrategy, ValueType};

    #[test]
    fn parse_flags_fixture() {
        let json = fs::read_to_string("tests/data/flags.json")
            .expect("Failed to read tests/data/flags.json");
        let declarations = FlagDeclarations::from_json(&json).unwrap();

        assert_eq!(declarations.flags.len(), 6);
        let discount = declarations
            .flags
            .iter()
            .find(|flag| flag.id == "discount-rate")
            .unwrap();
        assert_eq!(discount.value_type, ValueType::Double);
        assert_eq!(discount.error_strategy, ErrorStrategy::DefaultValue);
        assert_eq!(discount.default_value, Some(json!(0.0)));
    }

    #[test]
    fn error_strategy_defaults_to_default_value() {
        let declarations = FlagDeclarations::from_json(
            r#"
              {
                "flags": [
                  { "id": "minimal", "valueType": "STRING" }
                ]
              }
            "#,
        )
        .unwrap();

        let flag = &declarations.flags[0];
        assert_eq!(flag.error_strategy, ErrorStrategy::DefaultValue);
        assert_eq!(flag.name, None);
        assert_eq!(flag.default_value, None);
    }

    #[test]
    fn unknown_value_type_is_a_parse_error() {
        let err = FlagDeclarations::from_json(
            r#"{ "flags": [ { "id": "x", "valueType": "NEW_TYPE" } ] }"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationError::Parse(_)));
    }
}
