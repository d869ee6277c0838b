//! Metric prompt templates

use crate::backend::Prompt;
use crate::evaluation::metric::Metric;

const JSON_INSTRUCTION: &str = "Think step-by-step internally, but return ONLY a JSON object:\n\
{\"score\": <int 1-5>, \"explanation\": \"<one or two sentences>\"}";

const CORRECTNESS_SYSTEM: &str = "You are a data-savvy evaluator. Rate the factual correctness of the claim \
on a 1-to-5 scale, using the data analysis results as evidence:

5 - Fully supported by data (strong evidence)
4 - Mostly supported (minor caveats)
3 - Unclear or weak support
2 - Likely unsupported (contradicted by data)
1 - Clearly false or unverifiable";

const HELPFULNESS_SYSTEM: &str = "Evaluate how helpful or actionable this insight is for an analyst \
working on the task described. Rate 1-to-5:

5 - Highly actionable; directly informs decisions
4 - Useful; clear guidance
3 - Somewhat helpful; limited impact
2 - Slightly helpful; mostly trivia or obvious
1 - Not helpful; irrelevant or misleading";

const COMPLEXITY_SYSTEM: &str = "Assess the intellectual depth or novelty of the insight (1-to-5):

5 - Deep, non-obvious reasoning or novel pattern
4 - Above-average depth
3 - Moderate; basic but correct
2 - Shallow; obvious summary
1 - Trivial; no real analysis";

const COHERENCE_SYSTEM: &str = "Rate the clarity and logical flow of the insight (1-to-5):

5 - Crystal-clear, well-structured, logically consistent
4 - Mostly clear; minor wording issues
3 - Understandable but some gaps or awkwardness
2 - Hard to follow; poor structure
1 - Incoherent or contradictory";

const VERBOSITY_SYSTEM: &str = "Rate how well the level of detail matches what the claim needs (1-to-5):

5 - Concise yet complete; no fluff
4 - Slightly wordy or brief but acceptable
3 - Noticeably over- or under-detailed
2 - Excessively verbose or missing key info
1 - Severely verbose or extremely terse";

const CORRECTNESS_USER: &str = "Claim: {claim}

Dataset Summary: {dataset_summary}

Task Description: {task_description}

Data Analysis Results:
{analysis}";

const HELPFULNESS_USER: &str = "Claim: {claim}

Dataset Summary: {dataset_summary}

Task Description: {task_description}";

const COMPLEXITY_USER: &str = "Claim: {claim}

Dataset Summary: {dataset_summary}

Data Analysis Results:
{analysis}";

const CLAIM_ONLY_USER: &str = "Claim: {claim}";

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub claim: &'a str,
    pub dataset_summary: &'a str,
    pub task_description: &'a str,
    /// Rendered analysis findings
    pub analysis: &'a str,
}

/// Build the prompt for one metric
pub fn render(metric: Metric, ctx: &PromptContext<'_>) -> Prompt {
    let (system, user) = match metric {
        Metric::Correctness => (CORRECTNESS_SYSTEM, CORRECTNESS_USER),
        Metric::Helpfulness => (HELPFULNESS_SYSTEM, HELPFULNESS_USER),
        Metric::Complexity => (COMPLEXITY_SYSTEM, COMPLEXITY_USER),
        Metric::Coherence => (COHERENCE_SYSTEM, CLAIM_ONLY_USER),
        Metric::Verbosity => (VERBOSITY_SYSTEM, CLAIM_ONLY_USER),
    };

    Prompt::new(
        format!("{}\n\n{}", system, JSON_INSTRUCTION),
        fill(user, ctx),
    )
}

/// Single-pass placeholder substitution. Braces inside substituted values
/// are never re-expanded; unknown placeholders are left as written.
fn fill(template: &str, ctx: &PromptContext<'_>) -> String {
    let mut out = String::with_capacity(template.len() + ctx.claim.len() + ctx.analysis.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let value = match &after[..close] {
            "claim" => Some(ctx.claim),
            "dataset_summary" => Some(ctx.dataset_summary),
            "task_description" => Some(ctx.task_description),
            "analysis" => Some(ctx.analysis),
            _ => None,
        };
        match value {
            Some(v) => out.push_str(v),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
