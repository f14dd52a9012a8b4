mod batch;
mod evaluator;
mod single;

pub(crate) mod fallback;
pub(crate) mod outcome;

pub mod eval_details;

pub use batch::BatchResult;
pub use eval_details::{EvaluationDetails, EvaluationResultWithDetails, FlagMetadata};
pub use evaluator::Evaluator;
pub use outcome::{EvaluationOutcome, EvaluationReason, ValueSource};
