//! Data analysis capability
//!
//! A [`DataAnalyzer`] checks a claim against the dataset and produces
//! [`AnalysisFindings`]. Analyzers may return degraded findings instead of
//! erroring; the orchestrator treats both as non-fatal.

pub mod findings;
pub mod statistics;

pub use findings::{format_number, AnalysisFindings, Finding};
pub use statistics::{pearson, ColumnStats, StatisticalAnalyzer};

use async_trait::async_trait;
use std::sync::Arc;

use crate::dataset::Dataset;

/// Error types for analyzer operations
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Analysis task failed: {0}")]
    Internal(String),

    #[error("Analysis backend error: {0}")]
    Backend(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Capability that verifies a claim against a dataset
#[async_trait]
pub trait DataAnalyzer: Send + Sync {
    /// Analyzer name used in logs
    fn name(&self) -> &str;

    async fn analyze(&self, dataset: Arc<Dataset>, claim: &str) -> AnalysisResult<AnalysisFindings>;
}
