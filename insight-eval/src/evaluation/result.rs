//! Evaluation inputs and results

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::metric::{Metric, MetricScore};

/// A claim and the context it is judged in. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub dataset_summary: String,
    pub task_description: String,
}

impl Claim {
    pub fn new(
        text: impl Into<String>,
        dataset_summary: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            dataset_summary: dataset_summary.into(),
            task_description: task_description.into(),
        }
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every metric scored
    Complete,
    /// Some metrics scored
    Partial,
    /// No metric scored, or the run never reached scoring
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final report for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub claim: String,
    /// Always holds every metric, in [`Metric::all`] order
    pub scores: IndexMap<Metric, MetricScore>,
    pub average_score: f64,
    pub analysis_summary: String,
    pub timestamp: DateTime<Utc>,
    pub execution_time_seconds: f64,
    pub run_status: RunStatus,
    /// Why the run failed before or during scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn score(&self, metric: Metric) -> Option<&MetricScore> {
        self.scores.get(&metric)
    }

    /// Number of metrics that produced a usable score
    pub fn ok_count(&self) -> usize {
        self.scores.values().filter(|s| s.is_ok()).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
