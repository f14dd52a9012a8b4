use std::time::Duration;

use crate::{
    configuration_store::FlagConfigStore, Error, EvaluationError, EvaluatorConfig, FlagType,
    FlagValue, QueryOptions, Result, ValueType,
};

use super::{
    batch::{evaluate_batch, BatchResult},
    eval_details::EvaluationResultWithDetails,
    single::evaluate_flag,
};

/// Evaluates flags declared in a [`FlagConfigStore`] against a remote source.
///
/// Cloning is cheap and clones share the store and the transport.
///
/// All evaluation methods return `Err` only for flags using
/// [`ErrorStrategy::Fail`](crate::ErrorStrategy::Fail) when the remote source is unavailable or
/// reports an error. Every other condition degrades to a value tagged with its
/// [`ValueSource`](crate::ValueSource) and [`EvaluationReason`](crate::EvaluationReason).
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Evaluator { config }
    }

    pub fn store(&self) -> &FlagConfigStore {
        &self.config.store
    }

    /// Return `true` if the remote source is able to answer queries.
    pub fn is_ready(&self) -> bool {
        self.config.transport.is_ready()
    }

    /// Wait for the remote source to become ready, at most `timeout`.
    ///
    /// Meant for startup. Evaluations never wait for readiness: a remote source that is not
    /// ready is treated as unavailable.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.config.transport.wait_ready()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                log::warn!(target: "izanami",
                           timeout:debug = timeout;
                           "remote source did not become ready in time");
                Err(Error::NotReady)
            }
        }
    }

    /// Merge per-call options with configured defaults.
    fn query_options(&self, options: &QueryOptions) -> QueryOptions {
        let mut options = options.clone();
        options.timeout = options.timeout.or(self.config.default_timeout);
        options.ignore_cache |= self.config.ignore_cache;
        options
    }

    /// Evaluate `identifier` (flag key or name) as `requested` type.
    pub async fn evaluate(
        &self,
        identifier: &str,
        requested: ValueType,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<FlagValue>, EvaluationError> {
        evaluate_flag(
            &self.config.store,
            self.config.transport.as_ref(),
            identifier,
            requested,
            &self.query_options(options),
        )
        .await
    }

    /// Evaluate several flags with a single remote round trip.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use serde_json::json;
    /// # use izanami_resolver::*;
    /// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
    /// let declarations = FlagDeclarations::from_json(r#"{"flags": [
    ///     {"id": "turbo-mode", "valueType": "BOOLEAN"},
    ///     {"id": "max-items", "valueType": "INTEGER", "defaultValue": 10}
    /// ]}"#)?;
    /// let store = FlagConfigStore::from_declarations(declarations, &CallbackRegistry::new())?;
    /// let transport = InMemoryTransport::new();
    /// transport.set_result("turbo-mode", RawResult::Success(json!(true)));
    ///
    /// let evaluator = EvaluatorConfig::new(Arc::new(store), Arc::new(transport)).to_evaluator();
    /// let batch = evaluator
    ///     .evaluate_batch(&["turbo-mode", "max-items"], &QueryOptions::new())
    ///     .await;
    ///
    /// assert_eq!(batch.boolean_value("turbo-mode").await?, Some(true));
    /// // Unavailable remote result, the configured default is used.
    /// assert_eq!(batch.integer_value("max-items").await?, Some(10));
    /// # Ok::<(), Error>(())
    /// # }).unwrap();
    /// ```
    pub async fn evaluate_batch(
        &self,
        identifiers: &[impl AsRef<str>],
        options: &QueryOptions,
    ) -> BatchResult {
        evaluate_batch(
            &self.config.store,
            self.config.transport.as_ref(),
            identifiers,
            &self.query_options(options),
        )
        .await
    }

    pub async fn details<T: FlagType>(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<T>, EvaluationError> {
        Ok(self
            .evaluate(identifier, T::VALUE_TYPE, options)
            .await?
            .and_then(T::from_flag_value))
    }

    /// Value of `identifier` as `T`. `Ok(None)` is the null value.
    pub async fn value<T: FlagType>(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<Option<T>, EvaluationError> {
        Ok(self.details::<T>(identifier, options).await?.value)
    }

    pub async fn boolean_value(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<Option<bool>, EvaluationError> {
        self.value(identifier, options).await
    }

    pub async fn string_value(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<Option<String>, EvaluationError> {
        self.value(identifier, options).await
    }

    pub async fn integer_value(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<Option<i64>, EvaluationError> {
        self.value(identifier, options).await
    }

    pub async fn double_value(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<Option<f64>, EvaluationError> {
        self.value(identifier, options).await
    }

    pub async fn object_value(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<Option<serde_json::Value>, EvaluationError> {
        self.value(identifier, options).await
    }

    pub async fn boolean_details(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<bool>, EvaluationError> {
        self.details(identifier, options).await
    }

    pub async fn string_details(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<String>, EvaluationError> {
        self.details(identifier, options).await
    }

    pub async fn integer_details(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<i64>, EvaluationError> {
        self.details(identifier, options).await
    }

    pub async fn double_details(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<f64>, EvaluationError> {
        self.details(identifier, options).await
    }

    pub async fn object_details(
        &self,
        identifier: &str,
        options: &QueryOptions,
    ) -> std::result::Result<EvaluationResultWithDetails<serde_json::Value>, EvaluationError> {
        self.details(identifier, options).await
    }
}
