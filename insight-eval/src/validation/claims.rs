//! Test claims with expected scores, and their JSON file format

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::HarnessError;
use crate::evaluation::Metric;

/// How true a test claim is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimCategory {
    Correct,
    Partial,
    Incorrect,
}

impl ClaimCategory {
    pub fn all() -> [ClaimCategory; 3] {
        [ClaimCategory::Correct, ClaimCategory::Partial, ClaimCategory::Incorrect]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimCategory::Correct => "correct",
            ClaimCategory::Partial => "partial",
            ClaimCategory::Incorrect => "incorrect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn all() -> [Difficulty; 3] {
        [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }
}

/// A claim with the scores a good evaluator should give it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestClaim {
    pub claim: String,
    pub expected_scores: IndexMap<Metric, u8>,
    pub category: ClaimCategory,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_rationale: Option<String>,
}

impl TestClaim {
    /// Expected scores in [`Metric::all`] order:
    /// correctness, helpfulness, complexity, coherence, verbosity
    pub fn new(
        claim: impl Into<String>,
        scores: [u8; 5],
        category: ClaimCategory,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            claim: claim.into(),
            expected_scores: Metric::all().into_iter().zip(scores).collect(),
            category,
            difficulty,
            expected_rationale: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.expected_rationale = Some(rationale.into());
        self
    }
}

/// Counts describing a validation dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub total_claims: usize,
    pub categories: IndexMap<ClaimCategory, usize>,
    pub difficulty_levels: IndexMap<Difficulty, usize>,
}

/// A saved set of test claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDataset {
    pub dataset_info: DatasetInfo,
    pub claims: Vec<TestClaim>,
}

impl ValidationDataset {
    pub fn new(claims: Vec<TestClaim>) -> Self {
        let categories = ClaimCategory::all()
            .into_iter()
            .map(|c| (c, claims.iter().filter(|t| t.category == c).count()))
            .collect();
        let difficulty_levels = Difficulty::all()
            .into_iter()
            .map(|d| (d, claims.iter().filter(|t| t.difficulty == d).count()))
            .collect();

        Self {
            dataset_info: DatasetInfo {
                total_claims: claims.len(),
                categories,
                difficulty_levels,
            },
            claims,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        let dataset: Self = serde_json::from_str(&content)?;
        Ok(dataset)
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

/// Parse a list of claims: a JSON array of strings, a JSON array of
/// objects with a `claim` field, or plain text with one claim per line
/// (blank lines and `#` comments skipped)
pub fn parse_claim_list(content: &str) -> Result<Vec<String>, HarnessError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
        return Ok(values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Object(mut obj) => match obj.remove("claim") {
                    Some(serde_json::Value::String(s)) => Some(s),
                    _ => None,
                },
                _ => None,
            })
            .collect());
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}
