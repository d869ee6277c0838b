//! Combines per-metric scores and findings into an [`EvaluationResult`]
//!
//! Everything here is pure: the same inputs always give the same result.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::metric::{Metric, MetricScore};
use super::result::{EvaluationResult, RunStatus};
use crate::analysis::AnalysisFindings;

const NOT_EVALUATED: &str = "metric was not evaluated";

/// Build the final result for a run that reached scoring.
///
/// `scores` may be partial or out of order; metrics without a score get a
/// failed placeholder. The first score for a metric wins.
pub fn aggregate(
    claim: &str,
    findings: &AnalysisFindings,
    scores: &[MetricScore],
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> EvaluationResult {
    let mut by_metric: IndexMap<Metric, MetricScore> = IndexMap::new();
    for metric in Metric::all() {
        let score = scores
            .iter()
            .find(|s| s.metric_name == metric)
            .cloned()
            .unwrap_or_else(|| MetricScore::failed(metric, NOT_EVALUATED));
        by_metric.insert(metric, score);
    }

    let ok: Vec<u8> = by_metric
        .values()
        .filter(|s| s.is_ok())
        .map(|s| s.score)
        .collect();

    EvaluationResult {
        claim: claim.to_string(),
        average_score: average(&ok),
        run_status: run_status(ok.len(), by_metric.len()),
        scores: by_metric,
        analysis_summary: summarize_findings(findings),
        timestamp: finished_at,
        execution_time_seconds: elapsed_seconds(started_at, finished_at),
        error: None,
    }
}

/// Result for a run that ended in the failed state: invalid input or a
/// run-level timeout. Every metric carries `reason` as a failed placeholder.
pub fn failed_result(
    claim: &str,
    reason: &str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> EvaluationResult {
    let scores = Metric::all()
        .into_iter()
        .map(|m| (m, MetricScore::failed(m, reason)))
        .collect();

    EvaluationResult {
        claim: claim.to_string(),
        scores,
        average_score: 0.0,
        analysis_summary: format!("✗ Run failed: {}", reason),
        timestamp: finished_at,
        execution_time_seconds: elapsed_seconds(started_at, finished_at),
        run_status: RunStatus::Failed,
        error: Some(reason.to_string()),
    }
}

/// Mean rounded to one decimal, `0.0` for no scores
pub fn average(scores: &[u8]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64;
    (mean * 10.0).round() / 10.0
}

pub fn run_status(ok: usize, total: usize) -> RunStatus {
    if ok == 0 {
        RunStatus::Failed
    } else if ok == total {
        RunStatus::Complete
    } else {
        RunStatus::Partial
    }
}

/// One ✓/✗ line per finding
pub fn summarize_findings(findings: &AnalysisFindings) -> String {
    if findings.entries.is_empty() {
        return match &findings.error {
            Some(err) => format!("✗ Analysis failed: {}", err),
            None => "No analysis findings".to_string(),
        };
    }

    let mut lines: Vec<String> = findings
        .entries
        .iter()
        .map(|(kind, f)| {
            format!(
                "{} {}: {}",
                if f.supported { "✓" } else { "✗" },
                kind,
                f.narrative
            )
        })
        .collect();
    if let Some(err) = &findings.error {
        lines.push(format!("✗ {}", err));
    }
    lines.join("\n")
}

fn elapsed_seconds(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> f64 {
    let millis = (finished_at - started_at).num_milliseconds().max(0);
    millis as f64 / 1000.0
}
