//! Analysis findings shared read-only by every metric scorer

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Result of one kind of analysis (e.g. "statistical_analysis")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub narrative: String,
    /// Named numeric values backing the narrative
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub values: IndexMap<String, f64>,
    /// Whether the check supports the claim
    pub supported: bool,
}

impl Finding {
    pub fn new(narrative: impl Into<String>, supported: bool) -> Self {
        Self {
            narrative: narrative.into(),
            values: IndexMap::new(),
            supported,
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

/// Everything the data analyzer produced for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFindings {
    pub entries: IndexMap<String, Finding>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisFindings {
    /// Empty successful findings; add entries with [`AnalysisFindings::with_entry`]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            success: true,
            error: None,
        }
    }

    /// Findings for an analysis that ran but could not check the claim
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            entries: IndexMap::new(),
            success: false,
            error: Some(reason.into()),
        }
    }

    /// Findings recorded when the analyzer itself errored or timed out
    pub fn failed(error: impl Into<String>) -> Self {
        Self::degraded(error)
    }

    pub fn with_entry(mut self, kind: impl Into<String>, finding: Finding) -> Self {
        self.entries.insert(kind.into(), finding);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text rendering for metric prompts
    pub fn prompt_context(&self) -> String {
        if self.entries.is_empty() {
            return match &self.error {
                Some(err) => format!("Data analysis unavailable: {}", err),
                None => "No data analysis results available.".to_string(),
            };
        }

        let mut lines = Vec::new();
        for (kind, finding) in &self.entries {
            lines.push(format!("Analysis: {}", kind));
            lines.push(format!("Results: {}", finding.narrative));
            if !finding.values.is_empty() {
                let values: Vec<String> = finding
                    .values
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, format_number(*v)))
                    .collect();
                lines.push(format!("Values: {}", values.join(", ")));
            }
        }
        if let Some(err) = &self.error {
            lines.push(format!("Note: {}", err));
        }
        lines.join("\n")
    }
}

impl Default for AnalysisFindings {
    fn default() -> Self {
        Self::new()
    }
}

/// Format with at most four decimals and no trailing zeros
pub fn format_number(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
