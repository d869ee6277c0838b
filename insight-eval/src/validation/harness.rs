//! Runs test claims through the evaluator and measures agreement

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::claims::{ClaimCategory, TestClaim};
use super::HarnessError;
use crate::evaluation::{
    DatasetInput, EvaluationOptions, EvaluationResult, Evaluator, Metric, RunStatus,
};

/// Expected vs. actual scores for one test claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCase {
    pub claim: String,
    pub category: ClaimCategory,
    pub expected: IndexMap<Metric, u8>,
    /// `None` where the metric did not score `ok`
    pub actual: IndexMap<Metric, Option<u8>>,
    pub average_score: f64,
    pub run_status: RunStatus,
}

impl ValidationCase {
    pub fn from_result(test: &TestClaim, result: &EvaluationResult) -> Self {
        let actual = Metric::all()
            .into_iter()
            .map(|m| {
                let score = result.score(m).filter(|s| s.is_ok()).map(|s| s.score);
                (m, score)
            })
            .collect();

        Self {
            claim: test.claim.clone(),
            category: test.category,
            expected: test.expected_scores.clone(),
            actual,
            average_score: result.average_score,
            run_status: result.run_status,
        }
    }
}

/// Agreement between expected and actual scores for one metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricAgreement {
    /// Cases where both an expected and an ok actual score exist
    pub compared: usize,
    /// Cases with an expected score but no ok actual score
    pub missing: usize,
    pub exact_matches: usize,
    pub within_one: usize,
    pub exact_rate: f64,
    pub within_one_rate: f64,
    pub mean_absolute_error: f64,
}

/// Mean evaluator output per claim category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub count: usize,
    pub mean_average_score: f64,
    /// Mean correctness over cases where it scored
    pub mean_correctness: Option<f64>,
}

/// Aggregate agreement over a validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total_claims: usize,
    pub status_counts: IndexMap<RunStatus, usize>,
    pub metrics: IndexMap<Metric, MetricAgreement>,
    pub categories: IndexMap<ClaimCategory, CategorySummary>,
    pub cases: Vec<ValidationCase>,
}

impl ValidationReport {
    pub fn from_cases(cases: Vec<ValidationCase>) -> Self {
        let mut status_counts: IndexMap<RunStatus, usize> = [
            (RunStatus::Complete, 0),
            (RunStatus::Partial, 0),
            (RunStatus::Failed, 0),
        ]
        .into_iter()
        .collect();
        for case in &cases {
            *status_counts.entry(case.run_status).or_insert(0) += 1;
        }

        let metrics = Metric::all()
            .into_iter()
            .map(|m| (m, agreement(&cases, m)))
            .collect();

        let mut categories = IndexMap::new();
        for category in ClaimCategory::all() {
            let members: Vec<&ValidationCase> = cases.iter().filter(|c| c.category == category).collect();
            if members.is_empty() {
                continue;
            }
            let correctness: Vec<f64> = members
                .iter()
                .filter_map(|c| c.actual.get(&Metric::Correctness).copied().flatten())
                .map(f64::from)
                .collect();
            categories.insert(
                category,
                CategorySummary {
                    count: members.len(),
                    mean_average_score: mean(members.iter().map(|c| c.average_score)),
                    mean_correctness: if correctness.is_empty() {
                        None
                    } else {
                        Some(mean(correctness.into_iter()))
                    },
                },
            );
        }

        Self {
            total_claims: cases.len(),
            status_counts,
            metrics,
            categories,
            cases,
        }
    }

    /// Mean exact-match rate over metrics that had comparisons
    pub fn overall_exact_rate(&self) -> f64 {
        mean(
            self.metrics
                .values()
                .filter(|a| a.compared > 0)
                .map(|a| a.exact_rate),
        )
    }

    /// Mean within-one rate over metrics that had comparisons
    pub fn overall_within_one_rate(&self) -> f64 {
        mean(
            self.metrics
                .values()
                .filter(|a| a.compared > 0)
                .map(|a| a.within_one_rate),
        )
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn agreement(cases: &[ValidationCase], metric: Metric) -> MetricAgreement {
    let mut result = MetricAgreement::default();
    let mut total_error = 0u32;

    for case in cases {
        let Some(&expected) = case.expected.get(&metric) else {
            continue;
        };
        match case.actual.get(&metric).copied().flatten() {
            Some(actual) => {
                let diff = (expected as i32 - actual as i32).unsigned_abs();
                result.compared += 1;
                total_error += diff;
                if diff == 0 {
                    result.exact_matches += 1;
                }
                if diff <= 1 {
                    result.within_one += 1;
                }
            }
            None => result.missing += 1,
        }
    }

    if result.compared > 0 {
        let n = result.compared as f64;
        result.exact_rate = result.exact_matches as f64 / n;
        result.within_one_rate = result.within_one as f64 / n;
        result.mean_absolute_error = total_error as f64 / n;
    }
    result
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Drives test claims through [`Evaluator::evaluate`]
pub struct ValidationHarness {
    evaluator: Evaluator,
}

impl ValidationHarness {
    pub fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    /// Evaluate every claim in order and compare with expectations
    pub async fn run(
        &self,
        claims: &[TestClaim],
        dataset: DatasetInput,
        options: EvaluationOptions,
    ) -> ValidationReport {
        let mut cases = Vec::with_capacity(claims.len());
        for (i, test) in claims.iter().enumerate() {
            tracing::info!("Validating claim {}/{}: {}", i + 1, claims.len(), test.claim);
            let result = self
                .evaluator
                .evaluate(&test.claim, dataset.clone(), options.clone())
                .await;
            cases.push(ValidationCase::from_result(test, &result));
        }
        ValidationReport::from_cases(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(category: ClaimCategory, expected: [u8; 5], actual: [Option<u8>; 5]) -> ValidationCase {
        let ok: Vec<u8> = actual.iter().flatten().copied().collect();
        ValidationCase {
            claim: "c".to_string(),
            category,
            expected: Metric::all().into_iter().zip(expected).collect(),
            actual: Metric::all().into_iter().zip(actual).collect(),
            average_score: crate::evaluation::aggregator::average(&ok),
            run_status: crate::evaluation::aggregator::run_status(ok.len(), 5),
        }
    }

    #[test]
    fn test_agreement_statistics() {
        let cases = vec![
            case(ClaimCategory::Correct, [5, 4, 3, 5, 4], [Some(5), Some(4), Some(1), Some(5), None]),
            case(ClaimCategory::Incorrect, [1, 1, 2, 4, 3], [Some(2), Some(1), Some(2), Some(4), None]),
        ];
        let report = ValidationReport::from_cases(cases);

        let correctness = &report.metrics[&Metric::Correctness];
        assert_eq!(correctness.compared, 2);
        assert_eq!(correctness.exact_matches, 1);
        assert_eq!(correctness.within_one, 2);
        assert_eq!(correctness.mean_absolute_error, 0.5);

        let complexity = &report.metrics[&Metric::Complexity];
        assert_eq!(complexity.within_one, 1);
        assert_eq!(complexity.mean_absolute_error, 1.0);

        let verbosity = &report.metrics[&Metric::Verbosity];
        assert_eq!(verbosity.compared, 0);
        assert_eq!(verbosity.missing, 2);

        assert_eq!(report.status_counts[&RunStatus::Partial], 2);
        assert_eq!(report.status_counts[&RunStatus::Complete], 0);
    }

    #[test]
    fn test_category_summary() {
        let cases = vec![
            case(ClaimCategory::Correct, [5, 4, 3, 5, 4], [Some(5); 5]),
            case(ClaimCategory::Correct, [5, 4, 3, 5, 4], [Some(3); 5]),
            case(ClaimCategory::Incorrect, [1, 1, 2, 4, 3], [None; 5]),
        ];
        let report = ValidationReport::from_cases(cases);
        let correct = &report.categories[&ClaimCategory::Correct];
        assert_eq!(correct.count, 2);
        assert_eq!(correct.mean_average_score, 4.0);
        assert_eq!(correct.mean_correctness, Some(4.0));
        assert_eq!(report.categories[&ClaimCategory::Incorrect].mean_correctness, None);
        assert!(!report.categories.contains_key(&ClaimCategory::Partial));
    }

    #[test]
    fn test_overall_rates_skip_uncompared_metrics() {
        let cases = vec![case(
            ClaimCategory::Correct,
            [5, 4, 3, 5, 4],
            [Some(5), Some(4), Some(3), Some(5), None],
        )];
        let report = ValidationReport::from_cases(cases);
        assert_eq!(report.overall_exact_rate(), 1.0);
        assert_eq!(report.overall_within_one_rate(), 1.0);
    }

    #[test]
    fn test_report_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        ValidationReport::from_cases(Vec::new()).save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"total_claims\": 0"));
    }
}
