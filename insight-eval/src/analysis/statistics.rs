//! Built-in statistical analyzer
//!
//! Matches the claim's wording against column names and category values,
//! then computes descriptive statistics, checks quoted numbers, estimates
//! correlations and compares category groups.

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::{format_number, AnalysisError, AnalysisFindings, AnalysisResult, DataAnalyzer, Finding};
use crate::dataset::{ColumnKind, Dataset};

const CORRELATION_CUES: &[&str] = &[
    "correlat", "relationship", "related", "associat", "tend", "higher", "lower",
    "increase", "decrease", "rise", "drop",
];
const NO_RELATION_CUES: &[&str] = &[
    "no relationship", "no correlation", "not related", "unrelated", "no relation", "no link",
];
const TOP_CUES: &[&str] = &["highest", "most", "largest", "best", "top", "greatest"];
const BOTTOM_CUES: &[&str] = &["lowest", "least", "smallest", "worst", "fewest"];

/// Descriptive statistics for a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1)
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        let std = if count > 1 {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            sum,
            mean,
            median,
            std,
            min: sorted[0],
            max: sorted[count - 1],
        })
    }

    fn get(&self, stat: Statistic) -> f64 {
        match stat {
            Statistic::Mean => self.mean,
            Statistic::Median => self.median,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Sum => self.sum,
            Statistic::Std => self.std,
        }
    }
}

/// Pearson correlation coefficient; `None` for fewer than two pairs or zero variance
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statistic {
    Mean,
    Median,
    Min,
    Max,
    Sum,
    Std,
}

impl Statistic {
    fn from_claim(claim: &str) -> Self {
        let has = |cues: &[&str]| cues.iter().any(|c| claim.contains(c));
        if has(&["median"]) {
            Statistic::Median
        } else if has(&["standard deviation", "std"]) {
            Statistic::Std
        } else if has(&["maximum", "max ", "highest", "largest", "most expensive"]) {
            Statistic::Max
        } else if has(&["minimum", "min ", "lowest", "smallest", "cheapest"]) {
            Statistic::Min
        } else if has(&["total", "sum of"]) {
            Statistic::Sum
        } else {
            Statistic::Mean
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
            Statistic::Std => "std",
        }
    }
}

/// How the claim relates a quoted number to the actual value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Equals,
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Positive,
    Negative,
    None,
}

/// Number quoted in a claim
#[derive(Debug, Clone, Copy)]
struct ClaimedNumber {
    value: f64,
    comparator: Comparator,
}

/// Statistical analyzer over an in-memory [`Dataset`]
#[derive(Debug, Clone)]
pub struct StatisticalAnalyzer {
    /// Relative tolerance for "equals" checks on quoted numbers
    tolerance: f64,
}

impl StatisticalAnalyzer {
    pub fn new() -> Self {
        Self { tolerance: 0.05 }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Run every applicable check synchronously
    pub fn analyze_sync(&self, dataset: &Dataset, claim: &str) -> AnalysisResult<AnalysisFindings> {
        if dataset.is_empty() {
            return Err(AnalysisError::EmptyDataset);
        }

        let claim_lower = claim.to_lowercase();
        let claim_tokens: IndexSet<String> = tokenize(&claim_lower).into_iter().collect();
        let columns = referenced_columns(dataset, &claim_tokens, &claim_lower);
        if columns.is_empty() {
            return Ok(AnalysisFindings::degraded("no dataset columns referenced by claim"));
        }

        let numeric: Vec<usize> = columns
            .iter()
            .copied()
            .filter(|&c| dataset.column_kind(c) == ColumnKind::Numeric)
            .collect();
        let categorical: Vec<usize> = columns
            .iter()
            .copied()
            .filter(|&c| dataset.column_kind(c) == ColumnKind::Categorical)
            .collect();

        let mut findings = AnalysisFindings::new();

        let stats: Vec<(usize, ColumnStats)> = numeric
            .iter()
            .filter_map(|&c| ColumnStats::from_values(&dataset.numeric_values(c)).map(|s| (c, s)))
            .collect();

        if let Some(finding) = describe_columns(dataset, &stats) {
            findings = findings.with_entry("statistical_analysis", finding);
        }

        let numbers = claimed_numbers(&claim_lower);
        if let Some(&(column, column_stats)) = stats.first().filter(|_| !numbers.is_empty()) {
            let statistic = Statistic::from_claim(&claim_lower);
            let finding = self.verify_numbers(dataset, column, &column_stats, statistic, &numbers);
            findings = findings.with_entry("claim_verification", finding);
        }

        if numeric.len() >= 2 && CORRELATION_CUES.iter().any(|c| claim_lower.contains(c)) {
            if let Some(finding) = correlate(dataset, numeric[0], numeric[1], &claim_lower) {
                findings = findings.with_entry("correlation_analysis", finding);
            }
        }

        if let Some(&category_column) = categorical.first() {
            let finding = analyze_categories(dataset, category_column, numeric.first().copied(), &claim_lower);
            findings = findings.with_entry("category_analysis", finding);
        }

        if findings.is_empty() {
            return Ok(AnalysisFindings::degraded("referenced columns hold no analyzable values"));
        }
        Ok(findings)
    }

    fn verify_numbers(
        &self,
        dataset: &Dataset,
        column: usize,
        stats: &ColumnStats,
        statistic: Statistic,
        numbers: &[ClaimedNumber],
    ) -> Finding {
        let actual = stats.get(statistic);
        let name = &dataset.columns()[column];

        // The number closest to the actual value is the one the claim is about
        let closest = numbers
            .iter()
            .min_by(|a, b| {
                let da = (a.value - actual).abs();
                let db = (b.value - actual).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
            .unwrap_or(numbers[0]);

        let relative = (closest.value - actual).abs() / actual.abs().max(f64::EPSILON);
        let (supported, verdict) = match closest.comparator {
            Comparator::Equals => (
                relative <= self.tolerance,
                format!(
                    "{:.1}% difference, tolerance {:.0}%",
                    relative * 100.0,
                    self.tolerance * 100.0
                ),
            ),
            Comparator::Above => (actual > closest.value, "claim says above".to_string()),
            Comparator::Below => (actual < closest.value, "claim says below".to_string()),
        };

        let narrative = format!(
            "Claimed {} vs actual {} of {} {} ({}): {}",
            format_number(closest.value),
            statistic.as_str(),
            name,
            format_number(actual),
            verdict,
            if supported { "supported" } else { "not supported" }
        );

        Finding::new(narrative, supported)
            .with_value("claimed", closest.value)
            .with_value("actual", actual)
            .with_value("relative_difference", relative)
    }
}

impl Default for StatisticalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataAnalyzer for StatisticalAnalyzer {
    fn name(&self) -> &str {
        "statistical"
    }

    async fn analyze(&self, dataset: Arc<Dataset>, claim: &str) -> AnalysisResult<AnalysisFindings> {
        let analyzer = self.clone();
        let claim = claim.to_string();
        tokio::task::spawn_blocking(move || analyzer.analyze_sync(&dataset, &claim))
            .await
            .map_err(|e| AnalysisError::Internal(e.to_string()))?
    }
}

fn describe_columns(dataset: &Dataset, stats: &[(usize, ColumnStats)]) -> Option<Finding> {
    if stats.is_empty() {
        return None;
    }
    let mut lines = Vec::new();
    let mut finding = Finding::new(String::new(), true);
    for (column, s) in stats.iter().take(3) {
        let name = &dataset.columns()[*column];
        lines.push(format!(
            "{}: mean={}, median={}, std={}, min={}, max={} (n={})",
            name,
            format_number(s.mean),
            format_number(s.median),
            format_number(s.std),
            format_number(s.min),
            format_number(s.max),
            s.count
        ));
        let key = name.to_lowercase();
        finding = finding
            .with_value(format!("{}.mean", key), s.mean)
            .with_value(format!("{}.median", key), s.median)
            .with_value(format!("{}.std", key), s.std);
    }
    finding.narrative = lines.join("; ");
    Some(finding)
}

fn correlate(dataset: &Dataset, a: usize, b: usize, claim: &str) -> Option<Finding> {
    let r = pearson(&dataset.numeric_pairs(a, b))?;
    let expected = expected_direction(claim);
    let observed = if r.abs() < 0.1 {
        Direction::None
    } else if r > 0.0 {
        Direction::Positive
    } else {
        Direction::Negative
    };
    let strength = match r.abs() {
        x if x < 0.1 => "negligible",
        x if x < 0.3 => "weak",
        x if x < 0.5 => "moderate",
        _ => "strong",
    };
    let supported = expected == observed;
    let narrative = format!(
        "Pearson correlation between {} and {} is r={} ({} {}); claim implies {}",
        dataset.columns()[a],
        dataset.columns()[b],
        format_number(r),
        strength,
        match observed {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
            Direction::None => "relationship",
        },
        match expected {
            Direction::Positive => "a positive relationship",
            Direction::Negative => "a negative relationship",
            Direction::None => "no relationship",
        }
    );
    Some(Finding::new(narrative, supported).with_value("pearson_r", r))
}

fn expected_direction(claim: &str) -> Direction {
    if NO_RELATION_CUES.iter().any(|c| claim.contains(c)) {
        Direction::None
    } else if claim.contains("negative")
        || claim.contains("inverse")
        || (claim.contains("lower") && claim.contains("higher"))
    {
        Direction::Negative
    } else {
        Direction::Positive
    }
}

fn analyze_categories(dataset: &Dataset, column: usize, measure: Option<usize>, claim: &str) -> Finding {
    let name = &dataset.columns()[column];

    // Per-category count and, when a numeric column is referenced, its sum
    let mut groups: IndexMap<&str, (usize, f64, usize)> = IndexMap::new();
    for row in dataset.rows() {
        let Some(category) = row.get(column).and_then(|c| c.as_text()) else {
            continue;
        };
        let entry = groups.entry(category).or_insert((0, 0.0, 0));
        entry.0 += 1;
        if let Some(value) = measure.and_then(|m| row.get(m)).and_then(|c| c.as_number()) {
            entry.1 += value;
            entry.2 += 1;
        }
    }

    let total: usize = groups.values().map(|g| g.0).sum();
    let rank_value = |g: &(usize, f64, usize)| match measure {
        Some(_) if g.2 > 0 => g.1 / g.2 as f64,
        Some(_) => f64::NEG_INFINITY,
        None => g.0 as f64,
    };

    let mut ranked: Vec<(&str, f64)> = groups.iter().map(|(k, g)| (*k, rank_value(g))).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let basis = match measure {
        Some(m) => format!("mean {}", dataset.columns()[m]),
        None => "frequency".to_string(),
    };
    let top: Vec<String> = ranked
        .iter()
        .take(5)
        .map(|(k, v)| format!("{} ({})", k, format_number(*v)))
        .collect();

    let mentioned = ranked
        .iter()
        .position(|(k, _)| mentions_value(claim, k));

    let mut finding = Finding::new(
        format!("Top {} values by {}: {}", name, basis, top.join(", ")),
        true,
    );
    if let Some(pos) = mentioned {
        let (value, _) = ranked[pos];
        let count = groups.get(value).map(|g| g.0).unwrap_or(0);
        finding = finding
            .with_value("mentioned_rank", (pos + 1) as f64)
            .with_value("mentioned_share", count as f64 / total.max(1) as f64);

        if TOP_CUES.iter().any(|c| claim.contains(c)) {
            finding.supported = pos == 0;
        } else if BOTTOM_CUES.iter().any(|c| claim.contains(c)) {
            finding.supported = pos + 1 == ranked.len();
        }
        finding.narrative.push_str(&format!(
            "; '{}' ranks {} of {}",
            value,
            pos + 1,
            ranked.len()
        ));
    }
    finding
}

/// Split into lowercase word tokens, also breaking camelCase and snake_case
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase();
            current.extend(ch.to_lowercase());
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.into_iter().map(|t| stem(&t).to_string()).collect()
}

fn stem(token: &str) -> &str {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

fn mentions_value(claim: &str, value: &str) -> bool {
    let value = value.to_lowercase();
    if value.len() < 3 {
        return false;
    }
    claim.match_indices(&value).any(|(idx, _)| {
        let before = claim[..idx].chars().next_back();
        let after = claim[idx + value.len()..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

/// Columns the claim talks about, strongest match first.
///
/// Tokens shared by more than half of the columns (e.g. an "item_" prefix)
/// do not count as a reference. Categorical columns are also referenced
/// when the claim names one of their values.
fn referenced_columns(dataset: &Dataset, claim_tokens: &IndexSet<String>, claim: &str) -> Vec<usize> {
    let column_tokens: Vec<IndexSet<String>> = dataset
        .columns()
        .iter()
        .map(|c| tokenize(c).into_iter().filter(|t| t.len() >= 2).collect())
        .collect();

    let mut frequency: IndexMap<&str, usize> = IndexMap::new();
    for tokens in &column_tokens {
        for token in tokens {
            *frequency.entry(token.as_str()).or_insert(0) += 1;
        }
    }
    let column_count = column_tokens.len();
    let is_weak = |token: &str| {
        column_count > 2 && frequency.get(token).copied().unwrap_or(0) * 2 > column_count
    };

    let mut scored: Vec<(usize, usize)> = Vec::new();
    for (idx, tokens) in column_tokens.iter().enumerate() {
        let mut matched = tokens
            .iter()
            .filter(|t| !is_weak(t) && claim_tokens.contains(*t))
            .count();

        if matched == 0 && dataset.column_kind(idx) == ColumnKind::Categorical {
            let distinct: IndexSet<&str> = dataset.text_values(idx).into_iter().collect();
            if distinct.iter().any(|v| mentions_value(claim, v)) {
                matched = 1;
            }
        }

        if matched > 0 {
            scored.push((idx, matched));
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().map(|(idx, _)| idx).collect()
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d[\d,]*(?:\.\d+)?)(\s*%)?").expect("number pattern is valid")
    })
}

/// Numbers quoted in the claim with the comparison wording before them.
/// Percentages are skipped since they rarely refer to a raw column value.
fn claimed_numbers(claim: &str) -> Vec<ClaimedNumber> {
    let mut numbers = Vec::new();
    for caps in number_pattern().captures_iter(claim) {
        if caps.get(2).is_some() {
            continue;
        }
        let Some(m) = caps.get(1) else { continue };
        // Digits glued to letters are identifiers, not quantities
        if claim[..m.start()].chars().next_back().map_or(false, char::is_alphabetic) {
            continue;
        }
        let Ok(value) = m.as_str().replace(',', "").parse::<f64>() else {
            continue;
        };

        let prefix_start = m.start().saturating_sub(24);
        let prefix = claim.get(prefix_start..m.start()).unwrap_or("");
        let comparator = if ["over", "more than", "above", "exceed", "greater than", "at least"]
            .iter()
            .any(|c| prefix.contains(c))
        {
            Comparator::Above
        } else if ["under", "less than", "below", "fewer than", "at most"]
            .iter()
            .any(|c| prefix.contains(c))
        {
            Comparator::Below
        } else {
            Comparator::Equals
        };

        numbers.push(ClaimedNumber { value, comparator });
    }
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let csv = "Item_Weight,Item_Type,Item_MRP,Item_Outlet_Sales\n\
10.0,Dairy,100,1000\n\
12.0,Dairy,150,1600\n\
14.0,Meat,200,2100\n\
16.0,Snacks,250,2400\n\
13.0,Snacks,50,500\n";
        Dataset::from_csv_reader("sample", csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_column_stats() {
        let stats = ColumnStats::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.std - 1.2909944).abs() < 1e-6);
        assert!(ColumnStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_pearson() {
        let perfect = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!((pearson(&perfect).unwrap() - 1.0).abs() < 1e-9);
        let inverse = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!((pearson(&inverse).unwrap() + 1.0).abs() < 1e-9);
        assert!(pearson(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn test_tokenize_splits_names() {
        assert_eq!(tokenize("Item_Outlet_Sales"), vec!["item", "outlet", "sale"]);
        assert_eq!(tokenize("itemWeight"), vec!["item", "weight"]);
    }

    #[test]
    fn test_claimed_numbers() {
        let numbers = claimed_numbers("the average weight is over 1,000 kg, up 25% from 2019");
        assert_eq!(numbers.len(), 2);
        assert_eq!(numbers[0].value, 1000.0);
        assert_eq!(numbers[0].comparator, Comparator::Above);
        assert_eq!(numbers[1].value, 2019.0);
    }

    #[test]
    fn test_weak_prefix_tokens_do_not_reference() {
        let ds = sample();
        let claim = "the average item weight is 13 kg";
        let tokens: IndexSet<String> = tokenize(claim).into_iter().collect();
        let cols = referenced_columns(&ds, &tokens, claim);
        assert_eq!(cols, vec![0]);
    }

    #[test]
    fn test_mean_claim_supported() {
        let findings = StatisticalAnalyzer::new()
            .analyze_sync(&sample(), "The average item weight is 13 kg")
            .unwrap();
        assert!(findings.success);
        let verification = &findings.entries["claim_verification"];
        assert!(verification.supported);
        assert_eq!(verification.values["actual"], 13.0);
        assert!(findings.entries.contains_key("statistical_analysis"));
    }

    #[test]
    fn test_mean_claim_outside_tolerance() {
        let findings = StatisticalAnalyzer::new()
            .analyze_sync(&sample(), "The average item weight is 20 kg")
            .unwrap();
        assert!(!findings.entries["claim_verification"].supported);
    }

    #[test]
    fn test_correlation_direction() {
        let analyzer = StatisticalAnalyzer::new();
        let positive = analyzer
            .analyze_sync(&sample(), "Items with higher MRP tend to have higher sales")
            .unwrap();
        let corr = &positive.entries["correlation_analysis"];
        assert!(corr.supported);
        assert!(corr.values["pearson_r"] > 0.9);

        let negative = analyzer
            .analyze_sync(&sample(), "Items with lower MRP have higher sales")
            .unwrap();
        assert!(!negative.entries["correlation_analysis"].supported);
    }

    #[test]
    fn test_category_superlative() {
        let analyzer = StatisticalAnalyzer::new();
        let findings = analyzer
            .analyze_sync(&sample(), "Snacks have the highest sales")
            .unwrap();
        let category = &findings.entries["category_analysis"];
        // Meat averages 2100, Snacks 1450
        assert!(!category.supported);
        assert_eq!(category.values["mentioned_rank"], 2.0);

        let meat = analyzer.analyze_sync(&sample(), "Meat has the highest sales").unwrap();
        assert!(meat.entries["category_analysis"].supported);
    }

    #[test]
    fn test_unreferenced_claim_is_degraded() {
        let findings = StatisticalAnalyzer::new()
            .analyze_sync(&sample(), "Customers prefer evening shopping")
            .unwrap();
        assert!(!findings.success);
        assert!(findings.entries.is_empty());
        assert!(findings.error.is_some());
    }

    #[test]
    fn test_empty_dataset_errors() {
        let ds = Dataset::from_rows("empty", vec!["a".to_string()], Vec::new());
        assert!(matches!(
            StatisticalAnalyzer::new().analyze_sync(&ds, "a is 3"),
            Err(AnalysisError::EmptyDataset)
        ));
    }

    #[tokio::test]
    async fn test_async_analyze() {
        let analyzer = StatisticalAnalyzer::new();
        let findings = analyzer
            .analyze(Arc::new(sample()), "The median item MRP is 150")
            .await
            .unwrap();
        let verification = &findings.entries["claim_verification"];
        assert_eq!(verification.values["actual"], 150.0);
        assert!(verification.supported);
    }
}
