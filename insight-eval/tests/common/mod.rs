//! Scripted capabilities shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use insight_eval::analysis::{AnalysisError, AnalysisFindings, AnalysisResult, DataAnalyzer, Finding};
use insight_eval::backend::{BackendError, BackendResult, ModelBackend, ParsedResponse, Prompt, ResponseSchema};
use insight_eval::config::Config;
use insight_eval::dataset::Dataset;
use insight_eval::evaluation::Metric;
use insight_eval::providers::{
    CompletionRequest, CompletionResponse, LLMProvider, ProviderError, ProviderResult, RateLimiter,
};

pub const SAMPLE_CSV: &str = "Item_Identifier,Item_Weight,Item_Type,Item_MRP,Item_Outlet_Sales\n\
FDA15,10.0,Dairy,100,1000\n\
FDA16,12.0,Dairy,150,1600\n\
FDA17,14.0,Meat,200,2100\n\
FDA18,16.0,Snacks,250,2400\n\
FDA19,13.0,Dairy,50,500\n";

pub fn sample_dataset() -> Dataset {
    Dataset::from_csv_reader("sample", SAMPLE_CSV.as_bytes()).expect("sample csv")
}

/// Config with short timeouts suited to tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.evaluation.metric_timeout_ms = 200;
    config.evaluation.analysis_timeout_ms = 200;
    config.evaluation.run_timeout_ms = 5_000;
    config
}

/// Identify the metric a prompt was rendered for
pub fn metric_of(prompt: &Prompt) -> Metric {
    let system = &prompt.system;
    if system.contains("factual correctness") {
        Metric::Correctness
    } else if system.contains("helpful or actionable") {
        Metric::Helpfulness
    } else if system.contains("intellectual depth") {
        Metric::Complexity
    } else if system.contains("logical flow") {
        Metric::Coherence
    } else {
        Metric::Verbosity
    }
}

#[derive(Clone)]
pub enum Behavior {
    Reply(Value),
    Fail(String),
    Hang,
}

impl Behavior {
    pub fn score(score: impl Into<Value>) -> Self {
        Behavior::Reply(json!({"score": score.into(), "explanation": "scripted"}))
    }
}

/// Counts live calls; decremented when a call completes or is dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Backend answering each metric from a script
pub struct ScriptedBackend {
    behaviors: HashMap<Metric, Behavior>,
    default: Behavior,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    prompts: Mutex<Vec<(Metric, Prompt)>>,
}

impl ScriptedBackend {
    /// Every metric replies with `default`
    pub fn new(default: Behavior) -> Self {
        Self {
            behaviors: HashMap::new(),
            default,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Scores in `Metric::all()` order
    pub fn with_scores(scores: [i64; 5]) -> Self {
        let mut backend = Self::new(Behavior::Fail("unscripted".into()));
        for (metric, score) in Metric::all().into_iter().zip(scores) {
            backend.behaviors.insert(metric, Behavior::score(score));
        }
        backend
    }

    pub fn with(mut self, metric: Metric, behavior: Behavior) -> Self {
        self.behaviors.insert(metric, behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn prompt_for(&self, metric: Metric) -> Option<Prompt> {
        self.prompts
            .lock()
            .expect("prompt log")
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        schema: &ResponseSchema,
        _timeout: Duration,
    ) -> BackendResult<ParsedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight);

        let metric = metric_of(prompt);
        self.prompts
            .lock()
            .expect("prompt log")
            .push((metric, prompt.clone()));

        let behavior = self.behaviors.get(&metric).unwrap_or(&self.default).clone();
        match behavior {
            Behavior::Reply(value) => {
                insight_eval::backend::parse_response(&value.to_string(), schema)
            }
            Behavior::Fail(message) => Err(BackendError::MalformedResponse(message)),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(BackendError::MalformedResponse("hang finished".into()))
            }
        }
    }
}

#[derive(Clone)]
pub enum AnalyzerBehavior {
    Findings(AnalysisFindings),
    Fail,
    Hang,
}

/// Analyzer returning a fixed outcome
pub struct ScriptedAnalyzer {
    behavior: AnalyzerBehavior,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new(behavior: AnalyzerBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// One supported statistical finding
    pub fn supporting() -> Self {
        Self::new(AnalyzerBehavior::Findings(AnalysisFindings::new().with_entry(
            "statistical_analysis",
            Finding::new("Item_Weight: mean=13", true).with_value("item_weight.mean", 13.0),
        )))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataAnalyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, _dataset: Arc<Dataset>, _claim: &str) -> AnalysisResult<AnalysisFindings> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            AnalyzerBehavior::Findings(findings) => Ok(findings.clone()),
            AnalyzerBehavior::Fail => Err(AnalysisError::Backend("sandbox crashed".into())),
            AnalyzerBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(AnalysisError::Backend("hang finished".into()))
            }
        }
    }
}

/// Provider whose every request times out on the wire
pub struct TimingOutProvider {
    limiter: Arc<RateLimiter>,
}

impl TimingOutProvider {
    pub fn new() -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(0)),
        }
    }
}

#[async_trait]
impl LLMProvider for TimingOutProvider {
    fn name(&self) -> &str {
        "timing-out"
    }

    fn default_model(&self) -> &str {
        "slow-model"
    }

    async fn complete(&self, _request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        Err(ProviderError::Timeout { timeout_ms: 30_000 })
    }

    fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    async fn health_check(&self) -> ProviderResult<bool> {
        Ok(false)
    }
}
