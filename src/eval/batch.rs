use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    configuration_store::FlagConfigStore, EvaluationError, FlagConfig, FlagType, FlagValue,
    QueryOptions, RawResult, RemoteTransport, ValueType,
};

use super::{
    eval_details::{EvaluationResultWithDetails, FlagMetadata},
    single::{not_found, resolve_outcome},
};

/// Evaluate several flags with a single remote round trip.
///
/// Every identifier is resolved independently: identifiers that are not configured get a
/// `FLAG_NOT_FOUND` entry and do not affect the others.
pub(crate) async fn evaluate_batch(
    store: &FlagConfigStore,
    transport: &dyn RemoteTransport,
    identifiers: &[impl AsRef<str>],
    options: &QueryOptions,
) -> BatchResult {
    let mut entries = HashMap::new();
    let mut resolved = Vec::new();

    for identifier in identifiers {
        let identifier = identifier.as_ref();
        match store.resolve(identifier) {
            Some(config) => resolved.push((identifier.to_owned(), config)),
            None => {
                log::warn!(target: "izanami",
                           identifier;
                           "flag is not configured, batch entry will use zero value");
                entries.insert(
                    identifier.to_owned(),
                    BatchEntry::NotFound(FlagMetadata::not_found(identifier)),
                );
            }
        }
    }

    let mut seen = HashSet::new();
    let flag_ids: Vec<String> = resolved
        .iter()
        .map(|(_, config)| config.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let raw_results = if flag_ids.is_empty() {
        HashMap::new()
    } else {
        log::debug!(target: "izanami",
                    flags = flag_ids.len();
                    "querying remote source for a batch");
        transport.query_many(&flag_ids, options).await
    };

    let mut aliases = HashMap::new();
    for (identifier, config) in resolved {
        let raw = raw_results.get(&config.id).cloned().unwrap_or_else(|| {
            RawResult::Unavailable(format!(
                "remote response has no result for {:?}",
                config.id
            ))
        });

        // An alias only applies if the store resolves it to this same flag: a name may
        // coincide with another flag's key.
        for alias in std::iter::once(&config.id).chain(config.name.as_ref()) {
            if store
                .resolve(alias)
                .is_some_and(|it| Arc::ptr_eq(&it, &config))
            {
                aliases.insert(alias.clone(), identifier.clone());
            }
        }

        entries.insert(
            identifier.clone(),
            BatchEntry::Resolved {
                metadata: FlagMetadata::for_config(&identifier, &config),
                config,
                raw,
            },
        );
    }

    BatchResult { entries, aliases }
}

#[derive(Debug)]
enum BatchEntry {
    NotFound(FlagMetadata),
    Resolved {
        config: Arc<FlagConfig>,
        raw: RawResult,
        metadata: FlagMetadata,
    },
}

/// Result of a batch evaluation.
///
/// Holds the remote answer of every requested flag. Outcomes are computed on access, each one
/// independently, so a failing entry never affects the others. Entries can be looked up by the
/// identifier used in the request or by the other identifier (key or name) of the same flag.
///
/// Outcomes are not cached: each access to an entry that falls back to an
/// [`ErrorStrategy::Callback`](crate::ErrorStrategy::Callback) invokes the callback again.
#[derive(Debug)]
pub struct BatchResult {
    /// Keyed by caller-supplied identifier.
    entries: HashMap<String, BatchEntry>,
    /// Flag key or name to caller-supplied identifier.
    aliases: HashMap<String, String>,
}

impl BatchResult {
    /// Identifiers as supplied in the request.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return `true` if `identifier` refers to a configured flag of this batch.
    pub fn is_configured(&self, identifier: &str) -> bool {
        matches!(self.entry(identifier), Some(BatchEntry::Resolved { .. }))
    }

    fn entry(&self, identifier: &str) -> Option<&BatchEntry> {
        self.entries.get(identifier).or_else(|| {
            self.aliases
                .get(identifier)
                .and_then(|original| self.entries.get(original))
        })
    }

    /// Evaluate the entry for `identifier` as `requested` type.
    ///
    /// Identifiers that were not part of the request evaluate like unconfigured flags.
    pub async fn evaluate(
        &self,
        identifier: &str,
        requested: ValueType,
    ) -> Result<EvaluationResultWithDetails<FlagValue>, EvaluationError> {
        match self.entry(identifier) {
            None => Ok(not_found(FlagMetadata::not_found(identifier), requested)),
            Some(BatchEntry::NotFound(metadata)) => Ok(not_found(metadata.clone(), requested)),
            Some(BatchEntry::Resolved {
                config,
                raw,
                metadata,
            }) => resolve_outcome(config, raw.clone(), requested, metadata.clone()).await,
        }
    }

    pub async fn details<T: FlagType>(
        &self,
        identifier: &str,
    ) -> Result<EvaluationResultWithDetails<T>, EvaluationError> {
        Ok(self
            .evaluate(identifier, T::VALUE_TYPE)
            .await?
            .and_then(T::from_flag_value))
    }

    pub async fn value<T: FlagType>(&self, identifier: &str) -> Result<Option<T>, EvaluationError> {
        Ok(self.details::<T>(identifier).await?.value)
    }

    pub async fn boolean_value(&self, identifier: &str) -> Result<Option<bool>, EvaluationError> {
        self.value(identifier).await
    }

    pub async fn string_value(&self, identifier: &str) -> Result<Option<String>, EvaluationError> {
        self.value(identifier).await
    }

    pub async fn integer_value(&self, identifier: &str) -> Result<Option<i64>, EvaluationError> {
        self.value(identifier).await
    }

    pub async fn double_value(&self, identifier: &str) -> Result<Option<f64>, EvaluationError> {
        self.value(identifier).await
    }

    pub async fn object_value(
        &self,
        identifier: &str,
    ) -> Result<Option<serde_json::Value>, EvaluationError> {
        self.value(identifier).await
    }

    pub async fn boolean_details(
        &self,
        identifier: &str,
    ) -> Result<EvaluationResultWithDetails<bool>, EvaluationError> {
        self.details(identifier).await
    }

    pub async fn string_details(
        &self,
        identifier: &str,
    ) -> Result<EvaluationResultWithDetails<String>, EvaluationError> {
        self.details(identifier).await
    }

    pub async fn integer_details(
        &self,
        identifier: &str,
    ) -> Result<EvaluationResultWithDetails<i64>, EvaluationError> {
        self.details(identifier).await
    }

    pub async fn double_details(
        &self,
        identifier: &str,
    ) -> Result<EvaluationResultWithDetails<f64>, EvaluationError> {
        self.details(identifier).await
    }

    pub async fn object_details(
        &self,
        identifier: &str,
    ) -> Result<EvaluationResultWithDetails<serde_json::Value>, EvaluationError> {
        self.details(identifier).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        fs,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use async_trait::async_trait;
    use serde_json::json;

    use super::evaluate_batch;
    use crate::{
        configuration_store::FlagConfigStore,
        eval::outcome::{EvaluationReason, ValueSource},
        CallbackRegistry, CallbackRequest, EvaluationError, FlagDeclarations, InMemoryTransport,
        QueryOptions, RawResult, RemoteTransport,
    };

    fn store() -> FlagConfigStore {
        let json = fs::read_to_string("tests/data/flags.json").unwrap();
        let mut callbacks = CallbackRegistry::new();
        callbacks.register("banner-fallback", |_: CallbackRequest| json!({"text": "offline"}));
        FlagConfigStore::from_declarations(FlagDeclarations::from_json(&json).unwrap(), &callbacks)
            .unwrap()
    }

    #[tokio::test]
    async fn not_found_entries_are_isolated() {
        let store = store();
        let transport = InMemoryTransport::new();
        transport.set_result("7c1b6a2e-turbo", RawResult::Success(json!(true)));

        let batch = evaluate_batch(
            &store,
            &transport,
            &["turbo-mode", "not-configured"],
            &QueryOptions::new(),
        )
        .await;

        assert_eq!(batch.len(), 2);
        let turbo = batch.boolean_details("turbo-mode").await.unwrap();
        assert_eq!(turbo.value, Some(true));
        assert_eq!(turbo.value_source(), ValueSource::Remote);
        assert_eq!(turbo.evaluation_reason(), EvaluationReason::OriginOrCache);

        let missing = batch.boolean_details("not-configured").await.unwrap();
        assert_eq!(missing.value, Some(false));
        assert_eq!(missing.evaluation_reason(), EvaluationReason::FlagNotFound);
        assert!(!batch.is_configured("not-configured"));
    }

    #[tokio::test]
    async fn one_flag_failing_does_not_affect_others() {
        let store = store();
        let transport = InMemoryTransport::new();
        transport
            .set_result("banner-settings", RawResult::Success(json!("{broken")))
            .set_result("inactive-string", RawResult::Success(json!(null)))
            .set_result("max-items", RawResult::Success(json!(25)));

        let batch = evaluate_batch(
            &store,
            &transport,
            &["banner", "inactive-string", "max-items", "secret-codename"],
            &QueryOptions::new(),
        )
        .await;

        let banner = batch.object_details("banner").await.unwrap();
        assert_eq!(banner.value, Some(json!({"text": "offline"})));
        assert_eq!(banner.value_source(), ValueSource::ApplicationErrorStrategy);

        let inactive = batch.string_details("inactive-string").await.unwrap();
        assert_eq!(inactive.value.as_deref(), Some("fallback"));
        assert_eq!(inactive.evaluation_reason(), EvaluationReason::Disabled);

        assert_eq!(batch.integer_value("max-items").await.unwrap(), Some(25));

        // secret-codename has no remote result and uses the FAIL strategy.
        assert!(matches!(
            batch.string_value("secret-codename").await,
            Err(EvaluationError::RemoteUnavailable(_))
        ));
        // Accessing the failing entry does not change the others.
        assert_eq!(batch.integer_value("max-items").await.unwrap(), Some(25));
    }

    #[tokio::test]
    async fn entries_are_reachable_by_key_and_name() {
        let store = store();
        let transport = InMemoryTransport::new();
        transport.set_result("7c1b6a2e-turbo", RawResult::Success(json!(true)));

        let batch = evaluate_batch(&store, &transport, &["7c1b6a2e-turbo"], &QueryOptions::new())
            .await;

        assert_eq!(batch.boolean_value("7c1b6a2e-turbo").await.unwrap(), Some(true));
        assert_eq!(batch.boolean_value("turbo-mode").await.unwrap(), Some(true));
        assert!(batch.is_configured("turbo-mode"));
        assert_eq!(
            batch
                .boolean_details("turbo-mode")
                .await
                .unwrap()
                .details
                .metadata
                .identifier,
            "7c1b6a2e-turbo"
        );
    }

    #[tokio::test]
    async fn name_shadowed_by_another_key_is_not_an_alias() {
        let declarations = FlagDeclarations::from_json(
            r#"{"flags": [
                {"id": "a", "name": "b", "valueType": "INTEGER", "errorStrategy": "NULL_VALUE"},
                {"id": "b", "valueType": "INTEGER", "errorStrategy": "NULL_VALUE"}
            ]}"#,
        )
        .unwrap();
        let store = FlagConfigStore::from_declarations(declarations, &CallbackRegistry::new())
            .unwrap();
        let transport = InMemoryTransport::new();
        transport
            .set_result("a", RawResult::Success(json!(111)))
            .set_result("b", RawResult::Success(json!(222)));

        let batch = evaluate_batch(&store, &transport, &["a"], &QueryOptions::new()).await;

        assert_eq!(batch.integer_value("a").await.unwrap(), Some(111));
        // "b" resolves to the flag keyed "b", which was not requested.
        assert!(!batch.is_configured("b"));
        let b = batch.integer_details("b").await.unwrap();
        assert_eq!(b.evaluation_reason(), EvaluationReason::FlagNotFound);
        assert_eq!(b.details.metadata.config_key, None);
    }

    #[tokio::test]
    async fn callback_runs_on_every_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let json = fs::read_to_string("tests/data/flags.json").unwrap();
        let mut callbacks = CallbackRegistry::new();
        {
            let calls = calls.clone();
            callbacks.register("banner-fallback", move |_: CallbackRequest| {
                calls.fetch_add(1, Ordering::SeqCst);
                json!({"text": "offline"})
            });
        }
        let store = FlagConfigStore::from_declarations(
            FlagDeclarations::from_json(&json).unwrap(),
            &callbacks,
        )
        .unwrap();
        let transport = InMemoryTransport::new();

        let batch = evaluate_batch(&store, &transport, &["banner"], &QueryOptions::new()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = batch.object_value("banner").await.unwrap();
        let second = batch.object_value("banner-settings").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unrequested_identifier_evaluates_as_not_found() {
        let store = store();
        let transport = InMemoryTransport::new();

        let batch = evaluate_batch(&store, &transport, &["max-items"], &QueryOptions::new()).await;

        let details = batch.double_details("discount-rate").await.unwrap();
        assert_eq!(details.value, Some(0.0));
        assert_eq!(details.evaluation_reason(), EvaluationReason::FlagNotFound);
    }

    struct CountingBulkTransport {
        calls: std::sync::Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RemoteTransport for CountingBulkTransport {
        async fn query_one(&self, _flag_id: &str, _options: &QueryOptions) -> RawResult {
            panic!("batch evaluation should use query_many");
        }

        async fn query_many(
            &self,
            flag_ids: &[String],
            _options: &QueryOptions,
        ) -> HashMap<String, RawResult> {
            self.calls.lock().unwrap().push(flag_ids.to_vec());
            // Answer only the first flag to simulate a partial response.
            flag_ids
                .iter()
                .take(1)
                .map(|id| (id.clone(), RawResult::Success(json!(1.5))))
                .collect()
        }

        fn is_ready(&self) -> bool {
            true
        }

        async fn wait_ready(&self) {}
    }

    #[tokio::test]
    async fn resolved_flags_share_one_round_trip() {
        let store = store();
        let transport = CountingBulkTransport {
            calls: std::sync::Mutex::new(Vec::new()),
        };

        let batch = evaluate_batch(
            &store,
            &transport,
            &["discount-rate", "max-items", "discount-rate", "unknown"],
            &QueryOptions::new(),
        )
        .await;

        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec![vec!["discount-rate".to_owned(), "max-items".to_owned()]]
        );
        assert_eq!(batch.double_value("discount-rate").await.unwrap(), Some(1.5));

        // Missing from the remote response: NULL_VALUE strategy applies.
        let max_items = batch.integer_details("max-items").await.unwrap();
        assert_eq!(max_items.value, None);
        assert_eq!(max_items.evaluation_reason(), EvaluationReason::Error);
    }

    #[tokio::test]
    async fn empty_batch_does_not_query_remote() {
        let store = store();
        let transport = InMemoryTransport::new();

        let batch = evaluate_batch(&store, &transport, &["unknown"], &QueryOptions::new()).await;

        assert_eq!(transport.query_count(), 0);
        assert_eq!(batch.identifiers().collect::<Vec<_>>(), vec!["unknown"]);
    }
}
