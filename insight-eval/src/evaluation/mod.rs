//! Claim evaluation: metric scoring, aggregation and the run workflow

pub mod aggregator;
pub mod metric;
pub mod orchestrator;
pub mod prompts;
pub mod result;
pub mod scorer;

pub use aggregator::{aggregate, failed_result};
pub use metric::{Metric, MetricScore, MetricStatus, SCORE_MAX, SCORE_MIN};
pub use orchestrator::{DatasetInput, EvalError, EvaluationOptions, Evaluator};
pub use result::{Claim, EvaluationResult, RunStatus};
pub use scorer::{normalize_score, MetricScorer};
