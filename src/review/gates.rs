//! Gate result aggregation.

use serde::Serialize;

use crate::schemas::{Assessment, ReviewIssue, ReviewResult};

/// Per-gate line in an aggregated verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSummary {
    pub gate: String,
    pub assessment: Assessment,
    pub issue_count: usize,
}

/// Combined verdict across all gates of one review step.
///
/// Only [`aggregate_gate_results`] constructs this, so `has_actionable_issues`
/// and `assessment` always agree with the issue list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReviewResult {
    assessment: Assessment,
    issues: Vec<ReviewIssue>,
    strengths: Vec<String>,
    has_actionable_issues: bool,
    gate_results: Vec<GateSummary>,
}

impl AggregatedReviewResult {
    pub fn assessment(&self) -> Assessment {
        self.assessment
    }

    pub fn issues(&self) -> &[ReviewIssue] {
        &self.issues
    }

    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn has_actionable_issues(&self) -> bool {
        self.has_actionable_issues
    }

    pub fn gate_results(&self) -> &[GateSummary] {
        &self.gate_results
    }

    /// Issues that need a fix, most severe first.
    pub fn actionable_issues(&self) -> Vec<&ReviewIssue> {
        let mut issues: Vec<&ReviewIssue> = self
            .issues
            .iter()
            .filter(|i| i.severity.is_actionable())
            .collect();
        issues.sort_by_key(|i| i.severity);
        issues
    }
}

/// Fold per-gate results, in gate order, into one verdict.
///
/// Issues and strengths are concatenated without deduplication. The result is
/// actionable iff any issue from any gate is critical or important, and
/// `needs_revision` exactly when actionable. A gate's own assessment does not
/// affect the overall verdict.
pub fn aggregate_gate_results(results: &[(String, ReviewResult)]) -> AggregatedReviewResult {
    let mut issues = Vec::new();
    let mut strengths = Vec::new();
    let mut gate_results = Vec::with_capacity(results.len());

    for (gate, result) in results {
        issues.extend(result.issues.iter().cloned());
        strengths.extend(result.strengths.iter().cloned());
        gate_results.push(GateSummary {
            gate: gate.clone(),
            assessment: result.assessment,
            issue_count: result.issues.len(),
        });
    }

    let has_actionable_issues = issues.iter().any(|i| i.severity.is_actionable());
    let assessment = if has_actionable_issues {
        Assessment::NeedsRevision
    } else {
        Assessment::Approved
    };

    AggregatedReviewResult {
        assessment,
        issues,
        strengths,
        has_actionable_issues,
        gate_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Severity;
    use serde_json::json;

    fn gate(name: &str, result: ReviewResult) -> (String, ReviewResult) {
        (name.to_string(), result)
    }

    fn with_strength(mut result: ReviewResult, strength: &str) -> ReviewResult {
        result.strengths.push(strength.to_string());
        result
    }

    #[test]
    fn test_empty_input_is_approved() {
        let aggregated = aggregate_gate_results(&[]);
        assert_eq!(aggregated.assessment(), Assessment::Approved);
        assert!(!aggregated.has_actionable_issues());
        assert!(aggregated.gate_results().is_empty());
    }

    #[test]
    fn test_one_critical_makes_whole_review_actionable() {
        let mut style = ReviewResult::approved();
        style.issues.push(ReviewIssue::new(
            Severity::Minor,
            "Inconsistent naming",
            "Rename to match the module",
        ));
        let aggregated = aggregate_gate_results(&[
            gate("style", style),
            gate(
                "security",
                ReviewResult::needs_revision(vec![ReviewIssue::new(
                    Severity::Critical,
                    "SQL injection",
                    "Bind parameters",
                )]),
            ),
        ]);
        assert!(aggregated.has_actionable_issues());
        assert_eq!(aggregated.assessment(), Assessment::NeedsRevision);
        assert_eq!(aggregated.issues().len(), 2);
        assert_eq!(aggregated.issues()[0].description, "Inconsistent naming");
        assert_eq!(aggregated.issues()[1].description, "SQL injection");
    }

    #[test]
    fn test_minor_issues_under_needs_revision_are_approved() {
        let aggregated = aggregate_gate_results(&[gate(
            "style",
            ReviewResult::needs_revision(vec![ReviewIssue::new(
                Severity::Minor,
                "Long function",
                "Split it",
            )]),
        )]);
        assert!(!aggregated.has_actionable_issues());
        assert_eq!(aggregated.assessment(), Assessment::Approved);
        assert_eq!(
            aggregated.gate_results()[0].assessment,
            Assessment::NeedsRevision
        );
    }

    #[test]
    fn test_concatenates_in_gate_order_without_dedup() {
        let issue = ReviewIssue::new(Severity::Important, "Same issue", "Fix once");
        let aggregated = aggregate_gate_results(&[
            gate(
                "a",
                with_strength(ReviewResult::needs_revision(vec![issue.clone()]), "tests"),
            ),
            gate(
                "b",
                with_strength(ReviewResult::needs_revision(vec![issue.clone()]), "docs"),
            ),
        ]);
        assert_eq!(aggregated.issues().len(), 2);
        assert_eq!(aggregated.strengths(), &["tests", "docs"]);
        let gates: Vec<&str> = aggregated
            .gate_results()
            .iter()
            .map(|g| g.gate.as_str())
            .collect();
        assert_eq!(gates, vec!["a", "b"]);
        assert_eq!(aggregated.gate_results()[1].issue_count, 1);
    }

    #[test]
    fn test_actionable_issues_sorted_by_severity() {
        let aggregated = aggregate_gate_results(&[gate(
            "mixed",
            ReviewResult::needs_revision(vec![
                ReviewIssue::new(Severity::Important, "b", "fix b"),
                ReviewIssue::new(Severity::Minor, "c", "fix c"),
                ReviewIssue::new(Severity::Critical, "a", "fix a"),
            ]),
        )]);
        let descs: Vec<&str> = aggregated
            .actionable_issues()
            .iter()
            .map(|i| i.description.as_str())
            .collect();
        assert_eq!(descs, vec!["a", "b"]);
    }

    #[test]
    fn test_serialized_shape() {
        let aggregated = aggregate_gate_results(&[gate("spec", ReviewResult::approved())]);
        let value = serde_json::to_value(&aggregated).unwrap();
        assert_eq!(value["assessment"], json!("approved"));
        assert_eq!(value["hasActionableIssues"], json!(false));
        assert_eq!(
            value["gateResults"],
            json!([{"gate": "spec", "assessment": "approved", "issueCount": 0}])
        );
    }
}
