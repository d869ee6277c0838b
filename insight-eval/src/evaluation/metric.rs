//! Metric definitions and per-metric scores

use serde::{Deserialize, Serialize};

/// Lowest score a metric can receive
pub const SCORE_MIN: u8 = 1;
/// Highest score a metric can receive
pub const SCORE_MAX: u8 = 5;

/// Quality dimensions a claim is scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Correctness,
    Helpfulness,
    Complexity,
    Coherence,
    Verbosity,
}

impl Metric {
    pub fn all() -> Vec<Metric> {
        vec![
            Metric::Correctness,
            Metric::Helpfulness,
            Metric::Complexity,
            Metric::Coherence,
            Metric::Verbosity,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Correctness => "correctness",
            Metric::Helpfulness => "helpfulness",
            Metric::Complexity => "complexity",
            Metric::Coherence => "coherence",
            Metric::Verbosity => "verbosity",
        }
    }

    /// Human-readable name for reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::Correctness => "Correctness",
            Metric::Helpfulness => "Helpfulness",
            Metric::Complexity => "Complexity",
            Metric::Coherence => "Coherence",
            Metric::Verbosity => "Verbosity",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correctness" => Ok(Metric::Correctness),
            "helpfulness" => Ok(Metric::Helpfulness),
            "complexity" => Ok(Metric::Complexity),
            "coherence" => Ok(Metric::Coherence),
            "verbosity" => Ok(Metric::Verbosity),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

/// Outcome of a single scorer invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Ok,
    Failed,
    Timeout,
}

/// Score for one metric. Built once by the scorer, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric_name: Metric,
    /// In `SCORE_MIN..=SCORE_MAX` when `status` is `Ok`, otherwise 0
    pub score: u8,
    pub explanation: String,
    pub status: MetricStatus,
}

impl MetricScore {
    /// A successful score; the value is clamped into range
    pub fn ok(metric: Metric, score: u8, explanation: impl Into<String>) -> Self {
        Self {
            metric_name: metric,
            score: score.clamp(SCORE_MIN, SCORE_MAX),
            explanation: explanation.into(),
            status: MetricStatus::Ok,
        }
    }

    pub fn failed(metric: Metric, error: impl Into<String>) -> Self {
        Self {
            metric_name: metric,
            score: 0,
            explanation: error.into(),
            status: MetricStatus::Failed,
        }
    }

    pub fn timeout(metric: Metric) -> Self {
        Self {
            metric_name: metric,
            score: 0,
            explanation: "<timeout>".to_string(),
            status: MetricStatus::Timeout,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == MetricStatus::Ok
    }
}
