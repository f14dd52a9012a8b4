//! Evaluation outcome resolution for Izanami feature flags.
//!
//! # Overview
//!
//! Flags are declared locally as [`FlagDeclaration`]s and validated once into a
//! [`FlagConfigStore`]. An [`Evaluator`] looks flags up by key or name, queries a
//! [`RemoteTransport`] and turns the remote answer into a value tagged with a [`ValueSource`] and
//! an [`EvaluationReason`]. When the remote source is unreachable, reports an error or sends a
//! value that cannot be converted, the flag's [`ErrorStrategy`] decides what is returned instead.
//!
//! [`Evaluator::evaluate_batch`] evaluates several flags with one remote round trip, and
//! [`FlagProvider`] adapts evaluations to a multi-type provider contract.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Invalid declarations fail store construction with a [`ConfigurationError`]. At evaluation time,
//! only flags using [`ErrorStrategy::Fail`] ever return an [`EvaluationError`]: every other
//! condition, including an unknown flag, degrades to a best-effort value with metadata explaining
//! where it comes from.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with structured key-values,
//! under the `izanami` target. Consider integrating a `log`-compatible logger implementation for
//! better visibility into fallbacks.
//!
//! # Examples
//!
//! A runnable example lives in `demos/simple` (`cargo run --example simple`).

#![warn(rustdoc::missing_crate_level_docs)]

mod callback;
mod config;
mod error;
mod flag_config;
mod provider;
mod remote;
mod value;

pub mod configuration_store;
pub mod declaration;
pub mod eval;

pub use callback::{CallbackRegistry, CallbackRequest, ErrorCallback, SharedErrorCallback};
pub use config::EvaluatorConfig;
pub use configuration_store::{FlagConfigStore, FlagConfigStoreBuilder};
pub use declaration::{FlagDeclaration, FlagDeclarations};
pub use error::{ConfigurationError, Error, EvaluationError, Result};
pub use eval::{
    BatchResult, EvaluationDetails, EvaluationOutcome, EvaluationReason,
    EvaluationResultWithDetails, Evaluator, FlagMetadata, ValueSource,
};
pub use flag_config::{CallbackRef, ErrorStrategy, FlagConfig};
pub use provider::{
    ErrorCode, EvaluationContext, FlagProvider, ProviderEvaluation, ProviderMetadata,
};
pub use remote::{InMemoryTransport, QueryOptions, RawResult, RemoteTransport};
pub use value::{FlagType, FlagValue, ValueType};
