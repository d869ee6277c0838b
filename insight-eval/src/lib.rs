//! Claim evaluation for data insights
//!
//! Checks natural-language claims about a tabular dataset. Each run
//! verifies the claim against the data with a statistical analyzer, scores
//! it on five quality metrics with a language model (in parallel, each
//! call under its own timeout), and aggregates everything into one
//! [`EvaluationResult`](evaluation::EvaluationResult).
//!
//! # Features
//!
//! - Evaluation workflow with failure isolation per metric and a run-level timeout
//! - Ollama and OpenAI-compatible model backends
//! - Statistical analyzer over CSV/JSON datasets
//! - Validation harness with synthetic claims and agreement statistics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use insight_eval::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::load(None)?);
//!     let provider = create_provider(&config.llm)?;
//!     let backend = Arc::new(LlmBackend::from_config(provider, &config.llm));
//!     let analyzer = Arc::new(StatisticalAnalyzer::new());
//!
//!     let evaluator = Evaluator::new(config, backend, analyzer);
//!     let result = evaluator
//!         .evaluate(
//!             "The average item weight is 12.86",
//!             DatasetInput::Path("data/train.csv".into()),
//!             EvaluationOptions::default(),
//!         )
//!         .await;
//!
//!     println!("{} ({})", result.average_score, result.run_status);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod providers;
pub mod reporting;
pub mod validation;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{AnalysisFindings, DataAnalyzer, Finding, StatisticalAnalyzer};
    pub use crate::backend::{LlmBackend, ModelBackend, ParsedResponse, Prompt, ResponseSchema};
    pub use crate::config::Config;
    pub use crate::dataset::Dataset;
    pub use crate::evaluation::{
        DatasetInput, EvaluationOptions, EvaluationResult, Evaluator, Metric, MetricScore,
        MetricStatus, RunStatus,
    };
    pub use crate::providers::{create_provider, LLMProvider, OllamaClient, OpenAIClient};
    pub use crate::reporting::{print_result, JsonReport};
    pub use crate::validation::{ClaimGenerator, TestClaim, ValidationHarness, ValidationReport};
}
