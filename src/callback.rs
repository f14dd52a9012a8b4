use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{EvaluationError, ValueType};

/// Describes the failure that led to an error callback being invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRequest {
    /// Remote key of the flag being evaluated.
    pub flag_id: String,
    pub error: EvaluationError,
    pub requested_type: ValueType,
    pub declared_type: ValueType,
}

/// Computes a fallback value for flags configured with
/// [`ErrorStrategy::Callback`](crate::ErrorStrategy::Callback).
///
/// The returned JSON value goes through the same type coercion as a configured default value,
/// so a callback returning `"42"` for an integer flag produces `42`.
///
/// Plain closures implement this trait:
///
/// ```
/// # use izanami_resolver::{CallbackRegistry, CallbackRequest};
/// let mut registry = CallbackRegistry::new();
/// registry.register("safe-off", |_request: CallbackRequest| serde_json::json!(false));
/// ```
#[async_trait]
pub trait ErrorCallback {
    async fn on_error(&self, request: CallbackRequest) -> serde_json::Value;
}

#[async_trait]
impl<T> ErrorCallback for T
where
    T: Fn(CallbackRequest) -> serde_json::Value + Send + Sync,
{
    async fn on_error(&self, request: CallbackRequest) -> serde_json::Value {
        self(request)
    }
}

pub type SharedErrorCallback = Arc<dyn ErrorCallback + Send + Sync>;

/// Named error callbacks, looked up once while the flag configuration store is built.
#[derive(Default, Clone)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, SharedErrorCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        CallbackRegistry::default()
    }

    /// Register `callback` under `name`, replacing any previous registration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        callback: impl ErrorCallback + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.insert(name.into(), Arc::new(callback));
        self
    }

    pub fn get(&self, name: &str) -> Option<SharedErrorCallback> {
        self.callbacks.get(name).cloned()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.callbacks.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CallbackRegistry, CallbackRequest};
    use crate::{EvaluationError, ValueType};

    #[tokio::test]
    async fn closures_are_callbacks() {
        let mut registry = CallbackRegistry::new();
        registry.register("echo-type", |request: CallbackRequest| {
            json!(format!("{:?}", request.requested_type))
        });

        let callback = registry.get("echo-type").unwrap();
        let value = callback
            .on_error(CallbackRequest {
                flag_id: "flag".to_owned(),
                error: EvaluationError::RemoteUnavailable("down".to_owned()),
                requested_type: ValueType::String,
                declared_type: ValueType::String,
            })
            .await;

        assert_eq!(value, json!("String"));
        assert!(registry.get("missing").is_none());
    }
}
