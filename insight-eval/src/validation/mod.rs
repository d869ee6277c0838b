//! Validation harness: synthetic claims with known answers, and agreement
//! statistics between expected and actual scores

pub mod claims;
pub mod generator;
pub mod harness;

pub use claims::{
    parse_claim_list, ClaimCategory, DatasetInfo, Difficulty, TestClaim, ValidationDataset,
};
pub use generator::ClaimGenerator;
pub use harness::{
    CategorySummary, MetricAgreement, ValidationCase, ValidationHarness, ValidationReport,
};

/// Error types for validation files
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
