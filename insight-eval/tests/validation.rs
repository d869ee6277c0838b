//! Validation harness runs over generated claims

mod common;

use std::sync::Arc;

use common::{sample_dataset, test_config, Behavior, ScriptedBackend};
use insight_eval::analysis::StatisticalAnalyzer;
use insight_eval::evaluation::{EvaluationOptions, Evaluator, Metric, RunStatus};
use insight_eval::validation::{ClaimGenerator, ValidationDataset, ValidationHarness, ValidationReport};

async fn validate(backend: ScriptedBackend) -> (usize, ValidationReport) {
    let dataset = Arc::new(sample_dataset());
    let claims = ClaimGenerator::new(&dataset).generate(9);
    assert!(!claims.is_empty());

    let evaluator = Evaluator::new(
        Arc::new(test_config()),
        Arc::new(backend),
        Arc::new(StatisticalAnalyzer::new()),
    );
    let report = ValidationHarness::new(evaluator)
        .run(&claims, dataset.into(), EvaluationOptions::default())
        .await;
    (claims.len(), report)
}

#[tokio::test]
async fn test_harness_compares_every_metric() {
    let (count, report) = validate(ScriptedBackend::with_scores([3, 3, 3, 3, 3])).await;

    assert_eq!(report.total_claims, count);
    assert_eq!(report.cases.len(), count);
    assert_eq!(report.status_counts[&RunStatus::Complete], count);
    assert_eq!(report.status_counts[&RunStatus::Failed], 0);

    for agreement in report.metrics.values() {
        assert_eq!(agreement.compared, count);
        assert_eq!(agreement.missing, 0);
        assert!(agreement.within_one <= agreement.compared);
        assert!(agreement.exact_matches <= agreement.within_one);
        assert!(agreement.mean_absolute_error <= 2.0);
    }
    let categories: usize = report.categories.values().map(|c| c.count).sum();
    assert_eq!(categories, count);
}

#[tokio::test]
async fn test_harness_counts_missing_scores() {
    let backend = ScriptedBackend::with_scores([3, 3, 3, 3, 3])
        .with(Metric::Correctness, Behavior::Fail("unparseable".into()));
    let (count, report) = validate(backend).await;

    let correctness = &report.metrics[&Metric::Correctness];
    assert_eq!(correctness.compared, 0);
    assert_eq!(correctness.missing, count);
    assert_eq!(correctness.exact_rate, 0.0);
    assert_eq!(report.status_counts[&RunStatus::Partial], count);
    assert!(report
        .categories
        .values()
        .all(|c| c.mean_correctness.is_none()));
}

#[tokio::test]
async fn test_generated_dataset_file_drives_harness() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("validation_dataset.json");

    let dataset = sample_dataset();
    let generated = ValidationDataset::new(ClaimGenerator::new(&dataset).generate(6));
    generated.save(&path).unwrap();
    let loaded = ValidationDataset::load(&path).unwrap();
    assert_eq!(loaded.claims.len(), generated.claims.len());

    let evaluator = Evaluator::new(
        Arc::new(test_config()),
        Arc::new(ScriptedBackend::with_scores([5, 4, 3, 5, 4])),
        Arc::new(StatisticalAnalyzer::new()),
    );
    let report = ValidationHarness::new(evaluator)
        .run(&loaded.claims, dataset.into(), EvaluationOptions::default())
        .await;

    let report_path = dir.path().join("out").join("validation.json");
    report.save(&report_path).unwrap();
    let content = std::fs::read_to_string(&report_path).unwrap();
    assert!(content.contains("\"within_one_rate\""));
    assert!(content.contains("\"correctness\""));
}
