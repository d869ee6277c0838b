//! Synthetic test claims derived from a dataset's own statistics

use crate::analysis::{format_number, pearson, ColumnStats};
use crate::dataset::{ColumnKind, Dataset};

use super::claims::{ClaimCategory, Difficulty, TestClaim};

/// Categorical columns with more distinct values than this are identifiers
const MAX_CATEGORY_VALUES: usize = 30;
/// Minimum |r| for a relationship worth making claims about
const MIN_CORRELATION: f64 = 0.3;

/// Builds claims whose truth is known from the data. Deterministic: the
/// same dataset always yields the same claims in the same order.
pub struct ClaimGenerator<'a> {
    dataset: &'a Dataset,
}

impl<'a> ClaimGenerator<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Up to `count` claims, interleaving correct, partial and incorrect
    pub fn generate(&self, count: usize) -> Vec<TestClaim> {
        let buckets = [self.correct_claims(), self.partial_claims(), self.incorrect_claims()];
        let longest = buckets.iter().map(Vec::len).max().unwrap_or(0);

        let mut claims = Vec::new();
        for i in 0..longest {
            for bucket in &buckets {
                if let Some(claim) = bucket.get(i) {
                    claims.push(claim.clone());
                }
            }
        }
        claims.truncate(count);
        claims
    }

    fn correct_claims(&self) -> Vec<TestClaim> {
        let mut claims = Vec::new();

        for (column, stats) in self.numeric_stats().into_iter().take(3) {
            claims.push(
                TestClaim::new(
                    format!("The average {} is {}.", readable(column), format_number(round2(stats.mean))),
                    [5, 3, 2, 5, 5],
                    ClaimCategory::Correct,
                    Difficulty::Easy,
                )
                .with_rationale("matches the column mean"),
            );
        }

        if let Some((a, b, r)) = self.strongest_correlation() {
            let direction = if r > 0.0 { "higher" } else { "lower" };
            claims.push(
                TestClaim::new(
                    format!(
                        "Records with higher {} tend to have {} {}.",
                        readable(a),
                        direction,
                        readable(b)
                    ),
                    [5, 4, 3, 5, 4],
                    ClaimCategory::Correct,
                    Difficulty::Easy,
                )
                .with_rationale(format!("Pearson r = {}", format_number(r))),
            );
            claims.push(TestClaim::new(
                format!(
                    "There is a {} correlation between {} and {}, which is worth considering in planning.",
                    if r > 0.0 { "positive" } else { "negative" },
                    readable(a),
                    readable(b)
                ),
                [5, 5, 4, 5, 4],
                ClaimCategory::Correct,
                Difficulty::Medium,
            ));
        }

        if let Some((column, ranked)) = self.category_ranking() {
            claims.push(TestClaim::new(
                format!("{} is the most common {} in the dataset.", ranked[0].0, readable(column)),
                [5, 3, 2, 5, 5],
                ClaimCategory::Correct,
                Difficulty::Easy,
            ));
        }

        claims
    }

    fn partial_claims(&self) -> Vec<TestClaim> {
        let mut claims = Vec::new();

        if let Some((column, stats)) = self.numeric_stats().into_iter().next() {
            claims.push(TestClaim::new(
                format!("Some records have higher {} than others.", readable(column)),
                [3, 1, 1, 3, 2],
                ClaimCategory::Partial,
                Difficulty::Easy,
            ));
            // Roughly right, outside the 5% tolerance
            claims.push(TestClaim::new(
                format!(
                    "The average {} is about {}.",
                    readable(column),
                    format_number(round2(stats.mean * 1.15))
                ),
                [3, 2, 2, 5, 4],
                ClaimCategory::Partial,
                Difficulty::Medium,
            ));
        }

        if let Some((a, b, r)) = self.strongest_correlation() {
            let direction = if r > 0.0 { "higher" } else { "lower" };
            claims.push(TestClaim::new(
                format!(
                    "Higher {} causes {} {}, so every record should be pushed up.",
                    readable(a),
                    direction,
                    readable(b)
                ),
                [2, 2, 3, 4, 4],
                ClaimCategory::Partial,
                Difficulty::Medium,
            ));
        }

        if let Some((column, ranked)) = self.category_ranking() {
            claims.push(TestClaim::new(
                format!("{} values appear often for {}.", ranked[0].0, readable(column)),
                [3, 2, 1, 4, 2],
                ClaimCategory::Partial,
                Difficulty::Easy,
            ));
        }

        claims
    }

    fn incorrect_claims(&self) -> Vec<TestClaim> {
        let mut claims = Vec::new();

        for (column, stats) in self.numeric_stats().into_iter().take(2) {
            let wrong = if stats.mean.abs() < f64::EPSILON { 100.0 } else { stats.mean * 3.0 };
            claims.push(TestClaim::new(
                format!("The average {} is {}.", readable(column), format_number(round2(wrong))),
                [1, 2, 2, 4, 4],
                ClaimCategory::Incorrect,
                Difficulty::Medium,
            ));
        }

        if let Some((a, b, r)) = self.strongest_correlation() {
            claims.push(TestClaim::new(
                format!("There is no relationship between {} and {}.", readable(a), readable(b)),
                [1, 1, 2, 4, 3],
                ClaimCategory::Incorrect,
                Difficulty::Easy,
            ));
            let opposite = if r > 0.0 { "lower" } else { "higher" };
            claims.push(TestClaim::new(
                format!(
                    "Records with higher {} have significantly {} {}.",
                    readable(a),
                    opposite,
                    readable(b)
                ),
                [1, 1, 2, 4, 4],
                ClaimCategory::Incorrect,
                Difficulty::Easy,
            ));
        }

        if let Some((column, ranked)) = self.category_ranking() {
            if ranked.len() > 1 {
                let least = ranked[ranked.len() - 1].0;
                claims.push(TestClaim::new(
                    format!("{} is the most common {} in the dataset.", least, readable(column)),
                    [1, 1, 1, 4, 4],
                    ClaimCategory::Incorrect,
                    Difficulty::Easy,
                ));
            }
        }

        claims
    }

    fn numeric_stats(&self) -> Vec<(&'a str, ColumnStats)> {
        let dataset: &'a Dataset = self.dataset;
        (0..dataset.columns().len())
            .filter(|&c| dataset.column_kind(c) == ColumnKind::Numeric)
            .filter_map(|c| {
                ColumnStats::from_values(&dataset.numeric_values(c))
                    .filter(|s| s.std > 0.0)
                    .map(|s| (dataset.columns()[c].as_str(), s))
            })
            .collect()
    }

    /// Numeric column pair with the largest |r| above the threshold
    fn strongest_correlation(&self) -> Option<(&'a str, &'a str, f64)> {
        let dataset: &'a Dataset = self.dataset;
        let numeric: Vec<usize> = (0..dataset.columns().len())
            .filter(|&c| dataset.column_kind(c) == ColumnKind::Numeric)
            .collect();

        let mut best: Option<(usize, usize, f64)> = None;
        for (i, &a) in numeric.iter().enumerate() {
            for &b in &numeric[i + 1..] {
                let Some(r) = pearson(&dataset.numeric_pairs(a, b)) else {
                    continue;
                };
                if r.abs() >= MIN_CORRELATION && best.map_or(true, |(_, _, br)| r.abs() > br.abs()) {
                    best = Some((a, b, r));
                }
            }
        }

        best.map(|(a, b, r)| (dataset.columns()[a].as_str(), dataset.columns()[b].as_str(), r))
    }

    /// First low-cardinality text column with its values by frequency
    fn category_ranking(&self) -> Option<(&'a str, Vec<(&'a str, usize)>)> {
        let dataset: &'a Dataset = self.dataset;
        for column in 0..dataset.columns().len() {
            if dataset.column_kind(column) != ColumnKind::Categorical {
                continue;
            }
            let values = dataset.text_values(column);
            let mut counts: indexmap::IndexMap<&'a str, usize> = indexmap::IndexMap::new();
            for value in &values {
                *counts.entry(*value).or_insert(0) += 1;
            }
            // All-distinct columns are identifiers
            if counts.len() < 2 || counts.len() > MAX_CATEGORY_VALUES || counts.len() == values.len() {
                continue;
            }
            let mut ranked: Vec<(&'a str, usize)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            return Some((dataset.columns()[column].as_str(), ranked));
        }
        None
    }
}

/// "Item_Outlet_Sales" → "item outlet sales"
fn readable(column: &str) -> String {
    column
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
