//! Results reporting

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::evaluation::{EvaluationResult, MetricStatus, RunStatus};
use crate::validation::ValidationReport;

/// JSON export of one or more evaluation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub run_id: String,
    pub timestamp: String,
    pub model: String,
    pub total_claims: usize,
    pub status_counts: IndexMap<RunStatus, usize>,
    /// Mean of `average_score` over runs that were not failed
    pub mean_average_score: f64,
    pub results: Vec<EvaluationResult>,
}

impl JsonReport {
    pub fn from_results(run_id: impl Into<String>, model: impl Into<String>, results: Vec<EvaluationResult>) -> Self {
        let mut status_counts: IndexMap<RunStatus, usize> = IndexMap::new();
        for status in [RunStatus::Complete, RunStatus::Partial, RunStatus::Failed] {
            status_counts.insert(status, results.iter().filter(|r| r.run_status == status).count());
        }

        let scored: Vec<f64> = results
            .iter()
            .filter(|r| r.run_status != RunStatus::Failed)
            .map(|r| r.average_score)
            .collect();
        let mean_average_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        Self {
            run_id: run_id.into(),
            timestamp: Utc::now().to_rfc3339(),
            model: model.into(),
            total_claims: results.len(),
            status_counts,
            mean_average_score,
            results,
        }
    }

    /// Write to JSON file, creating parent directories
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Run identifier derived from the start time
pub fn run_id(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `<dir>/<prefix>_<run_id>.json`
pub fn output_path(dir: impl AsRef<Path>, prefix: &str, run_id: &str) -> PathBuf {
    dir.as_ref().join(format!("{}_{}.json", prefix, run_id))
}

/// Render one result as console text
pub fn format_result(result: &EvaluationResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n=== Evaluation: {} ===\n\n", result.claim));
    out.push_str(&format!(
        "Status: {}   Average score: {:.1}/5   Time: {:.2}s\n",
        result.run_status, result.average_score, result.execution_time_seconds
    ));
    if let Some(err) = &result.error {
        out.push_str(&format!("Error: {}\n", err));
    }

    out.push_str("\nMetric Scores:\n");
    out.push_str(&format!("{:-<60}\n", ""));
    for (metric, score) in &result.scores {
        let shown = match score.status {
            MetricStatus::Ok => format!("{}/5", score.score),
            MetricStatus::Failed => "failed".to_string(),
            MetricStatus::Timeout => "timeout".to_string(),
        };
        out.push_str(&format!("  {:<12} {:>8}  {}\n", metric.display_name(), shown, score.explanation));
    }

    out.push_str("\nData Analysis:\n");
    out.push_str(&format!("{:-<60}\n", ""));
    for line in result.analysis_summary.lines() {
        out.push_str(&format!("  {}\n", line));
    }
    out
}

pub fn print_result(result: &EvaluationResult) {
    println!("{}", format_result(result));
}

/// One line per result plus totals
pub fn print_batch_summary(results: &[EvaluationResult]) {
    println!("\n=== Batch Results ===\n");
    for (i, result) in results.iter().enumerate() {
        println!(
            "  {:>3}. [{:<8}] {:.1}  {}",
            i + 1,
            result.run_status.as_str(),
            result.average_score,
            result.claim
        );
    }
    let complete = results.iter().filter(|r| r.run_status == RunStatus::Complete).count();
    let failed = results.iter().filter(|r| r.run_status == RunStatus::Failed).count();
    println!(
        "\nTotal: {}  Complete: {}  Partial: {}  Failed: {}",
        results.len(),
        complete,
        results.len() - complete - failed,
        failed
    );
    println!("\n{:=<60}", "");
}

/// Render a validation report as console text
pub fn format_validation_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str("\n=== Validation Results ===\n\n");
    out.push_str(&format!("Total Claims: {}\n", report.total_claims));
    let statuses: Vec<String> = report
        .status_counts
        .iter()
        .map(|(status, count)| format!("{}={}", status, count))
        .collect();
    out.push_str(&format!("Run Status: {}\n", statuses.join(", ")));

    out.push_str("\nAgreement by Metric:\n");
    out.push_str(&format!("{:-<60}\n", ""));
    out.push_str(&format!(
        "  {:<12} {:>8} {:>8} {:>10} {:>6}\n",
        "Metric", "Exact", "Within1", "MAE", "N"
    ));
    for (metric, agreement) in &report.metrics {
        out.push_str(&format!(
            "  {:<12} {:>7.1}% {:>7.1}% {:>10.2} {:>6}\n",
            metric.display_name(),
            agreement.exact_rate * 100.0,
            agreement.within_one_rate * 100.0,
            agreement.mean_absolute_error,
            agreement.compared
        ));
    }
    out.push_str(&format!(
        "\n  Overall: {:.1}% exact, {:.1}% within one\n",
        report.overall_exact_rate() * 100.0,
        report.overall_within_one_rate() * 100.0
    ));

    if !report.categories.is_empty() {
        out.push_str("\nBy Claim Category:\n");
        out.push_str(&format!("{:-<60}\n", ""));
        for (category, summary) in &report.categories {
            let correctness = summary
                .mean_correctness
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "n/a".to_string());
            out.push_str(&format!(
                "  {:<10} n={:<4} avg score {:.2}, correctness {}\n",
                category.as_str(),
                summary.count,
                summary.mean_average_score,
                correctness
            ));
        }
    }
    out
}

pub fn print_validation_report(report: &ValidationReport) {
    println!("{}", format_validation_report(report));
    println!("{:=<60}", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisFindings;
    use crate::evaluation::{aggregate, failed_result, Metric, MetricScore};

    fn sample_result() -> EvaluationResult {
        let now = Utc::now();
        let scores = vec![
            MetricScore::ok(Metric::Correctness, 4, "supported by the mean"),
            MetricScore::timeout(Metric::Helpfulness),
        ];
        aggregate("Average weight is 12.9", &AnalysisFindings::new(), &scores, now, now)
    }

    #[test]
    fn test_format_result() {
        let text = format_result(&sample_result());
        assert!(text.contains("Average weight is 12.9"));
        assert!(text.contains("Status: partial"));
        assert!(text.contains("4/5"));
        assert!(text.contains("timeout"));
    }

    #[test]
    fn test_json_report_counts() {
        let now = Utc::now();
        let results = vec![sample_result(), failed_result("", "claim must not be empty", now, now)];
        let report = JsonReport::from_results("run", "llama3.2", results);
        assert_eq!(report.total_claims, 2);
        assert_eq!(report.status_counts[&RunStatus::Partial], 1);
        assert_eq!(report.status_counts[&RunStatus::Failed], 1);
        assert_eq!(report.mean_average_score, 4.0);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path().join("outputs"), "evaluation", "20240101_000000");
        JsonReport::from_results("r", "m", vec![sample_result()])
            .write_to_file(&path)
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["results"][0]["run_status"], "partial");
        assert_eq!(json["results"][0]["scores"]["helpfulness"]["status"], "timeout");
        assert_eq!(json["status_counts"]["partial"], 1);
    }

    #[test]
    fn test_validation_report_text() {
        let text = format_validation_report(&ValidationReport::from_cases(Vec::new()));
        assert!(text.contains("Total Claims: 0"));
        assert!(text.contains("Correctness"));
    }
}
