use serde::{Deserialize, Serialize};

use crate::{
    callback::{CallbackRegistry, SharedErrorCallback},
    declaration::FlagDeclaration,
    ConfigurationError, FlagValue, ValueType,
};

/// What to do when a flag value cannot be obtained from the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorStrategy {
    /// Use the configured default value, or the type's zero value if none is configured.
    #[default]
    DefaultValue,
    /// Use the type's null representation.
    NullValue,
    /// Return the triggering error to the caller.
    Fail,
    /// Ask a registered [`ErrorCallback`](crate::ErrorCallback) for a value.
    Callback,
}

/// Reference to a named error callback, resolved against a [`CallbackRegistry`] at startup.
#[derive(Clone)]
pub struct CallbackRef {
    pub name: String,
    /// `None` if no callback is registered under `name`.
    pub(crate) callback: Option<SharedErrorCallback>,
}

impl CallbackRef {
    pub fn is_resolved(&self) -> bool {
        self.callback.is_some()
    }
}

impl std::fmt::Debug for CallbackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRef")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Validated, immutable local declaration of one flag.
#[derive(Debug, Clone)]
pub struct FlagConfig {
    /// Remote key of the flag.
    pub id: String,
    /// Optional local alias.
    pub name: Option<String>,
    pub description: String,
    pub value_type: ValueType,
    pub error_strategy: ErrorStrategy,
    /// Already converted to `value_type`. Only set for [`ErrorStrategy::DefaultValue`].
    pub default_value: Option<FlagValue>,
    /// Only set for [`ErrorStrategy::Callback`].
    pub callback: Option<CallbackRef>,
}

impl FlagConfig {
    /// Validate a declaration and resolve its callback against `callbacks`.
    pub fn from_declaration(
        declaration: FlagDeclaration,
        callbacks: &CallbackRegistry,
    ) -> Result<FlagConfig, ConfigurationError> {
        let FlagDeclaration {
            id,
            name,
            description,
            value_type,
            error_strategy,
            default_value,
            callback,
        } = declaration;

        let default_value = match default_value {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(FlagValue::from_declared(&value, value_type).ok_or_else(|| {
                ConfigurationError::InvalidDefaultValue {
                    flag: id.clone(),
                    expected: value_type,
                    value: value.to_string(),
                }
            })?),
        };

        if default_value.is_some() && error_strategy != ErrorStrategy::DefaultValue {
            return Err(ConfigurationError::DefaultValueWithoutDefaultStrategy {
                flag: id,
                strategy: error_strategy,
            });
        }

        if callback.is_some() && error_strategy != ErrorStrategy::Callback {
            return Err(ConfigurationError::CallbackWithoutCallbackStrategy {
                flag: id,
                strategy: error_strategy,
            });
        }

        let callback = callback.map(|name| CallbackRef {
            callback: callbacks.get(&name),
            name,
        });

        if error_strategy == ErrorStrategy::Callback
            && !callback.as_ref().is_some_and(CallbackRef::is_resolved)
        {
            log::warn!(target: "izanami",
                       flag_id:display = id,
                       callback:display = callback.as_ref().map_or("<none>", |it| it.name.as_str());
                       "no callback registered for a CALLBACK flag, zero values will be used on errors");
        }

        Ok(FlagConfig {
            id,
            name,
            description,
            value_type,
            error_strategy,
            default_value,
            callback,
        })
    }

    /// Name if present, key otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
