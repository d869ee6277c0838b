//! Configuration management for the claim evaluator
//!
//! Loads settings from TOML files, applies environment overrides and
//! provides read-only runtime access. A `Config` is built once at startup
//! and shared behind an `Arc` by every evaluation run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::evaluation::Metric;

/// Environment variable overriding `llm.model`
pub const ENV_MODEL: &str = "INSIGHT_EVAL_MODEL";
/// Environment variable overriding `llm.base_url`
pub const ENV_BASE_URL: &str = "INSIGHT_EVAL_BASE_URL";
/// Environment variable overriding `llm.provider`
pub const ENV_PROVIDER: &str = "INSIGHT_EVAL_PROVIDER";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Language model backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend name ("ollama" or "openai")
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key (remote backends only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Backend-side request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Requests per minute
    #[serde(default = "default_rpm")]
    pub rpm: u32,
}

/// Dataset defaults used when the CLI does not supply them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
    #[serde(default = "default_dataset_name")]
    pub name: String,
    #[serde(default = "default_dataset_description")]
    pub description: String,
}

/// Evaluation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_metrics")]
    pub metrics: Vec<Metric>,
    /// Ceiling for a single metric scorer call
    #[serde(default = "default_metric_timeout_ms")]
    pub metric_timeout_ms: u64,
    /// Ceiling for the data analysis step
    #[serde(default = "default_analysis_timeout_ms")]
    pub analysis_timeout_ms: u64,
    /// Ceiling for a whole run when the caller does not pass one
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
    /// Claims evaluated at once by `evaluate_batch`
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default = "default_task_description")]
    pub task_description: String,
    /// Relative tolerance when checking numbers quoted in a claim
    #[serde(default = "default_numeric_tolerance")]
    pub numeric_tolerance: f64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_true")]
    pub save_results: bool,
}

// Default value functions
fn default_true() -> bool { true }
fn default_provider() -> String { "ollama".to_string() }
fn default_model() -> String { "llama3.2".to_string() }
fn default_base_url() -> String { "http://localhost:11434".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 2048 }
fn default_request_timeout_ms() -> u64 { 120_000 }
fn default_rpm() -> u32 { 120 }
fn default_data_path() -> String { "data/train.csv".to_string() }
fn default_dataset_name() -> String { "Big Mart Sales".to_string() }
fn default_dataset_description() -> String {
    "Retail sales data from Big Mart stores with item and outlet information".to_string()
}
fn default_metrics() -> Vec<Metric> { Metric::all() }
fn default_metric_timeout_ms() -> u64 { 120_000 }
fn default_analysis_timeout_ms() -> u64 { 300_000 }
fn default_run_timeout_ms() -> u64 { 600_000 }
fn default_batch_concurrency() -> usize { 2 }
fn default_task_description() -> String { "N/A".to_string() }
fn default_numeric_tolerance() -> f64 { 0.05 }
fn default_output_dir() -> String { "outputs".to_string() }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_request_timeout_ms(),
            rpm: default_rpm(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            name: default_dataset_name(),
            description: default_dataset_description(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            metric_timeout_ms: default_metric_timeout_ms(),
            analysis_timeout_ms: default_analysis_timeout_ms(),
            run_timeout_ms: default_run_timeout_ms(),
            batch_concurrency: default_batch_concurrency(),
            task_description: default_task_description(),
            numeric_tolerance: default_numeric_tolerance(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            save_results: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            dataset: DatasetConfig::default(),
            evaluation: EvaluationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn metric_timeout(&self) -> Duration {
        Duration::from_millis(self.metric_timeout_ms)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for a process.
    ///
    /// An explicit path must load; otherwise the default locations are tried
    /// and the built-in defaults are used when none exists. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            None => Self::load_or_default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/insight-eval.toml",
            "insight-eval/config/insight-eval.toml",
        ];

        for path in &config_paths {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path);
                    return config;
                }
                Err(ConfigError::Io(_)) => continue,
                Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Apply `INSIGHT_EVAL_*` overrides using the given variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.llm.model = model;
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(provider) = lookup(ENV_PROVIDER).filter(|v| !v.trim().is_empty()) {
            self.llm.provider = provider.to_lowercase();
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let metrics = &self.evaluation.metrics;
        if metrics.is_empty() {
            return Err(ConfigError::Invalid("evaluation.metrics must not be empty".to_string()));
        }
        for (i, metric) in metrics.iter().enumerate() {
            if metrics[..i].contains(metric) {
                return Err(ConfigError::Invalid(format!(
                    "evaluation.metrics lists '{}' more than once",
                    metric
                )));
            }
        }
        let timeouts = [
            ("llm.request_timeout_ms", self.llm.request_timeout_ms),
            ("evaluation.metric_timeout_ms", self.evaluation.metric_timeout_ms),
            ("evaluation.analysis_timeout_ms", self.evaluation.analysis_timeout_ms),
            ("evaluation.run_timeout_ms", self.evaluation.run_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }
        if self.evaluation.batch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "evaluation.batch_concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.evaluation.numeric_tolerance) {
            return Err(ConfigError::Invalid(
                "evaluation.numeric_tolerance must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid("llm.temperature must be between 0 and 2".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
