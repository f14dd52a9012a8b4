use crate::{
    configuration_store::FlagConfigStore, EvaluationError, FlagConfig, FlagValue, QueryOptions,
    RawResult, RemoteTransport, ValueType,
};

use super::{
    eval_details::{EvaluationResultWithDetails, FlagMetadata},
    fallback::FallbackResolver,
    outcome::{compute_outcome, EvaluationOutcome, EvaluationReason, ValueSource},
};

/// Evaluate one flag: resolve its configuration, query the remote source and compute the
/// outcome.
///
/// Identifiers missing from `store` never reach the remote source and evaluate to the zero value
/// of `requested`. Returns `Err` only for [`ErrorStrategy::Fail`](crate::ErrorStrategy::Fail)
/// flags whose remote evaluation failed.
pub(crate) async fn evaluate_flag(
    store: &FlagConfigStore,
    transport: &dyn RemoteTransport,
    identifier: &str,
    requested: ValueType,
    options: &QueryOptions,
) -> Result<EvaluationResultWithDetails<FlagValue>, EvaluationError> {
    let Some(config) = store.resolve(identifier) else {
        log::warn!(target: "izanami",
                   identifier;
                   "flag is not configured, returning zero value");
        return Ok(not_found(FlagMetadata::not_found(identifier), requested));
    };

    log::debug!(target: "izanami",
                identifier,
                flag_id:display = config.id;
                "querying remote source");
    let raw = transport.query_one(&config.id, options).await;

    resolve_outcome(
        &config,
        raw,
        requested,
        FlagMetadata::for_config(identifier, &config),
    )
    .await
}

/// Outcome of a flag whose remote answer is already known. Shared by single and batch
/// evaluation.
pub(crate) async fn resolve_outcome(
    config: &FlagConfig,
    raw: RawResult,
    requested: ValueType,
    metadata: FlagMetadata,
) -> Result<EvaluationResultWithDetails<FlagValue>, EvaluationError> {
    let outcome = match compute_outcome(raw, &FallbackResolver::new(config), requested).await {
        Ok(outcome) => outcome,
        Err(err) => {
            log::warn!(target: "izanami",
                       flag = config.display_name();
                       "evaluation failed and flag uses FAIL strategy: {err}");
            return Err(err);
        }
    };

    log::trace!(target: "izanami",
                flag_id:display = config.id,
                value:serde = outcome.value,
                source:debug = outcome.source,
                reason:debug = outcome.reason;
                "evaluated a flag");

    Ok(EvaluationResultWithDetails::new(outcome, metadata))
}

pub(crate) fn not_found(
    metadata: FlagMetadata,
    requested: ValueType,
) -> EvaluationResultWithDetails<FlagValue> {
    EvaluationResultWithDetails::new(
        EvaluationOutcome::new(
            Some(FlagValue::zero(requested)),
            ValueSource::ApplicationErrorStrategy,
            EvaluationReason::FlagNotFound,
        ),
        metadata,
    )
}
