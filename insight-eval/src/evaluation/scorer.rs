//! Per-metric scoring through the model backend

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::metric::{Metric, MetricScore, SCORE_MAX, SCORE_MIN};
use super::prompts::{self, PromptContext};
use super::result::Claim;
use crate::analysis::AnalysisFindings;
use crate::backend::{BackendError, ModelBackend, ResponseSchema};
use crate::providers::ProviderError;

/// Scores one metric per call. Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct MetricScorer {
    backend: Arc<dyn ModelBackend>,
    schema: Arc<ResponseSchema>,
}

impl MetricScorer {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            schema: Arc::new(ResponseSchema::metric_score()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    /// Score `metric` for `claim`. Never errors: timeouts and backend
    /// failures become placeholder scores.
    pub async fn score(
        &self,
        metric: Metric,
        claim: &Claim,
        findings: &AnalysisFindings,
        timeout: Duration,
    ) -> MetricScore {
        let analysis = findings.prompt_context();
        let prompt = prompts::render(
            metric,
            &PromptContext {
                claim: &claim.text,
                dataset_summary: &claim.dataset_summary,
                task_description: &claim.task_description,
                analysis: &analysis,
            },
        );
        tracing::debug!("{} prompt:\n{}\n{}", metric, prompt.system, prompt.user);

        // The backend gets the same budget but is not trusted to honor it
        let call = self.backend.generate(&prompt, &self.schema, timeout);
        let response = match tokio::time::timeout(timeout, call).await {
            Err(_)
            | Ok(Err(BackendError::Timeout { .. }))
            | Ok(Err(BackendError::Provider(ProviderError::Timeout { .. }))) => {
                tracing::warn!("{} timed out after {}ms", metric, timeout.as_millis());
                return MetricScore::timeout(metric);
            }
            Ok(Err(e)) => {
                tracing::warn!("{} failed: {}", metric, e);
                return MetricScore::failed(metric, e.to_string());
            }
            Ok(Ok(response)) => response,
        };

        let explanation = response.text("explanation").unwrap_or_default();
        let raw_score = response.get("score").cloned().unwrap_or(Value::Null);

        match normalize_score(&raw_score) {
            Some(score) => MetricScore::ok(metric, score, explanation),
            None => {
                tracing::warn!("{} returned non-numeric score {}", metric, raw_score);
                MetricScore::failed(metric, format!("non-numeric score: {}", raw_score))
            }
        }
    }
}

/// Convert a reply's score into the valid range.
///
/// Integers are clamped, floats rounded then clamped, numeric strings
/// parsed. Anything else is `None`.
pub fn normalize_score(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    let clamped = number.round().clamp(SCORE_MIN as f64, SCORE_MAX as f64);
    Some(clamped as u8)
}
