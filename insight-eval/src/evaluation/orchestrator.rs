//! Evaluation workflow
//!
//! Start → Analyzing → Scoring → Aggregating → Done, with Failed reached
//! from Start on invalid input or from anywhere on a run timeout. Scoring
//! fans out one task per metric and waits for all of them.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::aggregator;
use super::metric::{Metric, MetricScore};
use super::result::{Claim, EvaluationResult};
use super::scorer::MetricScorer;
use crate::analysis::{AnalysisFindings, DataAnalyzer};
use crate::backend::ModelBackend;
use crate::config::Config;
use crate::dataset::{Dataset, DatasetError};

/// Errors that end a run in the failed state
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dataset could not be loaded: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Run timed out after {timeout_ms}ms")]
    RunTimeout { timeout_ms: u64 },

    #[error("Dataset loading task failed: {0}")]
    LoadTask(String),
}

impl EvalError {
    /// Both invalid claims and unloadable datasets are input errors
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, EvalError::InvalidInput(_) | EvalError::Dataset(_))
    }
}

/// Dataset to evaluate against: already loaded, or a file to load
#[derive(Debug, Clone)]
pub enum DatasetInput {
    Loaded(Arc<Dataset>),
    Path(PathBuf),
}

impl From<Dataset> for DatasetInput {
    fn from(dataset: Dataset) -> Self {
        DatasetInput::Loaded(Arc::new(dataset))
    }
}

impl From<Arc<Dataset>> for DatasetInput {
    fn from(dataset: Arc<Dataset>) -> Self {
        DatasetInput::Loaded(dataset)
    }
}

impl From<PathBuf> for DatasetInput {
    fn from(path: PathBuf) -> Self {
        DatasetInput::Path(path)
    }
}

/// Per-call overrides of configured defaults
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    pub dataset_summary: Option<String>,
    pub task_description: Option<String>,
    /// Run-level timeout. Also caps the analysis and per-metric timeouts,
    /// so a hung step times out on its own before the whole run does.
    pub timeout: Option<Duration>,
}

/// Time kept back from step budgets so timed-out steps settle before the
/// run deadline
const MAX_SETTLE_MARGIN: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Start,
    Analyzing,
    Scoring,
    Aggregating,
    Done,
    Failed,
}

/// Current state of one run, for transition logs
struct RunTracker<'a> {
    label: &'a str,
    state: Mutex<RunState>,
}

impl<'a> RunTracker<'a> {
    fn new(label: &'a str) -> Self {
        tracing::info!("[{}] {}", label, RunState::Start);
        Self {
            label,
            state: Mutex::new(RunState::Start),
        }
    }

    fn advance(&self, to: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!("[{}] {} -> {}", self.label, *state, to);
        *state = to;
    }
}

/// Deadline and settle margin for one run
#[derive(Debug, Clone, Copy)]
struct Budget {
    deadline: Instant,
    margin: Duration,
}

impl Budget {
    fn new(run_timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + run_timeout,
            margin: (run_timeout / 10).min(MAX_SETTLE_MARGIN),
        }
    }

    /// `configured`, cut down to what is left before the deadline
    fn cap(&self, configured: Duration) -> Duration {
        let left = self
            .deadline
            .saturating_duration_since(Instant::now())
            .saturating_sub(self.margin);
        configured.min(left)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Start => "start",
            RunState::Analyzing => "analyzing",
            RunState::Scoring => "scoring",
            RunState::Aggregating => "aggregating",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Runs the evaluation workflow. Clones share configuration and
/// capabilities, so concurrent runs need no locking.
#[derive(Clone)]
pub struct Evaluator {
    config: Arc<Config>,
    analyzer: Arc<dyn DataAnalyzer>,
    scorer: MetricScorer,
}

impl Evaluator {
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn ModelBackend>,
        analyzer: Arc<dyn DataAnalyzer>,
    ) -> Self {
        Self {
            config,
            analyzer,
            scorer: MetricScorer::new(backend),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check a claim and resolve its dataset without invoking any capability
    pub async fn validate_input(&self, claim: &str, dataset: &DatasetInput) -> Result<Arc<Dataset>, EvalError> {
        if claim.trim().is_empty() {
            return Err(EvalError::InvalidInput("claim must not be empty".to_string()));
        }
        match dataset {
            DatasetInput::Loaded(dataset) => Ok(Arc::clone(dataset)),
            DatasetInput::Path(path) => {
                if !path.exists() {
                    return Err(EvalError::InvalidInput(format!(
                        "dataset not found: {}",
                        path.display()
                    )));
                }
                Ok(Arc::new(load_dataset(path.clone()).await?))
            }
        }
    }

    /// Evaluate one claim. Pipeline failures never surface as errors; they
    /// are reported through the result's `run_status`.
    pub async fn evaluate(
        &self,
        claim: &str,
        dataset: DatasetInput,
        options: EvaluationOptions,
    ) -> EvaluationResult {
        let started_at = Utc::now();
        let label = preview(claim);
        let tracker = RunTracker::new(&label);

        let dataset = match self.validate_input(claim, &dataset).await {
            Ok(dataset) => dataset,
            Err(e) => {
                tracing::error!("[{}] rejected: {}", label, e);
                tracker.advance(RunState::Failed);
                return aggregator::failed_result(claim, &e.to_string(), started_at, Utc::now());
            }
        };

        let claim = Claim::new(
            claim,
            options
                .dataset_summary
                .unwrap_or_else(|| self.default_summary(&dataset)),
            options
                .task_description
                .unwrap_or_else(|| self.config.evaluation.task_description.clone()),
        );

        let run_timeout = options
            .timeout
            .unwrap_or_else(|| self.config.evaluation.run_timeout());
        let budget = Budget::new(run_timeout);

        // Dropping the run future drops its JoinSet, which aborts every scorer
        let run = self.run(&tracker, claim.clone(), dataset, budget);
        match tokio::time::timeout(run_timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                let err = EvalError::RunTimeout {
                    timeout_ms: run_timeout.as_millis() as u64,
                };
                tracing::error!("[{}] {}", label, err);
                tracker.advance(RunState::Failed);
                aggregator::failed_result(&claim.text, &err.to_string(), started_at, Utc::now())
            }
        }
    }

    async fn run(
        &self,
        tracker: &RunTracker<'_>,
        claim: Claim,
        dataset: Arc<Dataset>,
        budget: Budget,
    ) -> EvaluationResult {
        let started_at = Utc::now();
        let label = tracker.label;

        tracker.advance(RunState::Analyzing);
        let analysis_timeout = budget.cap(self.config.evaluation.analysis_timeout());
        let findings = Arc::new(self.analyze(label, &claim, dataset, analysis_timeout).await);

        tracker.advance(RunState::Scoring);
        let claim = Arc::new(claim);
        let metric_timeout = budget.cap(self.config.evaluation.metric_timeout());
        let scores = self.score_all(label, &claim, &findings, metric_timeout).await;

        tracker.advance(RunState::Aggregating);
        let result = aggregator::aggregate(&claim.text, &findings, &scores, started_at, Utc::now());

        tracker.advance(RunState::Done);
        tracing::info!(
            "[{}] {} ({} of {} metrics ok, average {:.1})",
            label,
            result.run_status,
            result.ok_count(),
            result.scores.len(),
            result.average_score
        );
        result
    }

    /// Analysis failures are recorded in the findings and never end the run
    async fn analyze(
        &self,
        label: &str,
        claim: &Claim,
        dataset: Arc<Dataset>,
        timeout: Duration,
    ) -> AnalysisFindings {
        match tokio::time::timeout(timeout, self.analyzer.analyze(dataset, &claim.text)).await {
            Ok(Ok(findings)) => {
                if !findings.success {
                    tracing::warn!(
                        "[{}] analysis degraded: {}",
                        label,
                        findings.error.as_deref().unwrap_or("no detail")
                    );
                }
                findings
            }
            Ok(Err(e)) => {
                tracing::warn!("[{}] {} analyzer failed: {}", label, self.analyzer.name(), e);
                AnalysisFindings::failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!("[{}] analysis timed out after {}ms", label, timeout.as_millis());
                AnalysisFindings::failed(format!("analysis timed out after {}ms", timeout.as_millis()))
            }
        }
    }

    async fn score_all(
        &self,
        label: &str,
        claim: &Arc<Claim>,
        findings: &Arc<AnalysisFindings>,
        timeout: Duration,
    ) -> Vec<MetricScore> {
        let metrics: Vec<Metric> = self.config.evaluation.metrics.clone();

        let mut set = JoinSet::new();
        for (idx, metric) in metrics.iter().copied().enumerate() {
            let scorer = self.scorer.clone();
            let claim = Arc::clone(claim);
            let findings = Arc::clone(findings);
            set.spawn(async move { (idx, scorer.score(metric, &claim, &findings, timeout).await) });
        }

        let mut slots: Vec<Option<MetricScore>> = vec![None; metrics.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, score)) => slots[idx] = Some(score),
                Err(e) => tracing::warn!("[{}] scoring task ended abnormally: {}", label, e),
            }
        }

        slots
            .into_iter()
            .zip(metrics)
            .map(|(slot, metric)| {
                slot.unwrap_or_else(|| MetricScore::failed(metric, "scoring task ended abnormally"))
            })
            .collect()
    }

    /// Evaluate independent claims against one dataset, at most
    /// `batch_concurrency` at a time. Results follow input order.
    pub async fn evaluate_batch(
        &self,
        claims: Vec<String>,
        dataset: DatasetInput,
        options: EvaluationOptions,
    ) -> Vec<EvaluationResult> {
        // Load once; on failure every run reports the load error itself
        let dataset = match dataset {
            DatasetInput::Path(path) => match load_dataset(path.clone()).await {
                Ok(loaded) => DatasetInput::Loaded(Arc::new(loaded)),
                Err(_) => DatasetInput::Path(path),
            },
            loaded => loaded,
        };

        let semaphore = Arc::new(Semaphore::new(self.config.evaluation.batch_concurrency.max(1)));
        let mut set = JoinSet::new();
        for (idx, claim) in claims.iter().cloned().enumerate() {
            let evaluator = self.clone();
            let dataset = dataset.clone();
            let options = options.clone();
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (idx, evaluator.evaluate(&claim, dataset, options).await)
            });
        }

        let mut slots: Vec<Option<EvaluationResult>> = vec![None; claims.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => tracing::error!("Batch evaluation task ended abnormally: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(claims)
            .map(|(slot, claim)| {
                slot.unwrap_or_else(|| {
                    let now = Utc::now();
                    aggregator::failed_result(&claim, "evaluation task ended abnormally", now, now)
                })
            })
            .collect()
    }

    fn default_summary(&self, dataset: &Dataset) -> String {
        let description = self.config.dataset.description.trim();
        if description.is_empty() {
            dataset.summary()
        } else {
            format!("{}. {}", description.trim_end_matches('.'), dataset.summary())
        }
    }
}

/// Read and parse a dataset file off the async worker threads
async fn load_dataset(path: PathBuf) -> Result<Dataset, EvalError> {
    tokio::task::spawn_blocking(move || Dataset::from_path(&path))
        .await
        .map_err(|e| EvalError::LoadTask(e.to_string()))?
        .map_err(EvalError::from)
}

/// Short claim prefix for log lines
fn preview(claim: &str) -> String {
    let trimmed = claim.trim();
    if trimmed.chars().count() <= 40 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(40).collect();
        format!("{}...", cut)
    }
}
