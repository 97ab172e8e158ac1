//! Requirement-coverage report derived from verification output.

use serde::Serialize;

use crate::schemas::VerifyResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementStatus {
    pub id: String,
    pub description: String,
    pub met: bool,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub total_requirements: usize,
    pub met_requirements: usize,
    /// Rounded to the nearest whole percent; 0 when there are no requirements.
    pub percentage: u32,
    pub breakdown: Vec<RequirementStatus>,
    pub completed_tasks_count: usize,
    pub recommendations: Vec<String>,
    pub summary: String,
}

impl ComplianceReport {
    pub fn is_complete(&self) -> bool {
        self.total_requirements > 0 && self.met_requirements == self.total_requirements
    }
}

pub fn audit_compliance(verify: &VerifyResult, completed_tasks: &[String]) -> ComplianceReport {
    let total = verify.requirements.len();
    let met = verify.requirements.iter().filter(|r| r.met).count();
    let percentage = if total == 0 {
        0
    } else {
        ((met as f64 / total as f64) * 100.0).round() as u32
    };

    let breakdown = verify
        .requirements
        .iter()
        .map(|r| RequirementStatus {
            id: r.id.clone(),
            description: r.description.clone(),
            met: r.met,
            evidence: r.evidence.clone(),
        })
        .collect();

    ComplianceReport {
        total_requirements: total,
        met_requirements: met,
        percentage,
        breakdown,
        completed_tasks_count: completed_tasks.len(),
        recommendations: recommendations(verify),
        summary: summary(met, total, percentage),
    }
}

fn recommendations(verify: &VerifyResult) -> Vec<String> {
    let mut out: Vec<String> = verify
        .unmet()
        .map(|r| format!("Address unmet requirement: {} - {}", r.id, r.description))
        .collect();

    if verify.test_suite.failed > 0 {
        out.push(format!("Fix {} failing test(s)", verify.test_suite.failed));
    }
    if !verify.git_clean {
        out.push("Commit or discard uncommitted changes".to_string());
    }
    out
}

fn summary(met: usize, total: usize, percentage: u32) -> String {
    if total == 0 {
        return "No requirements defined".to_string();
    }
    if met == total {
        return format!("Specification complete: {met}/{total} requirements met (100%)");
    }
    format!("Specification {percentage}% complete: {met}/{total} requirements met")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{RequirementVerification, TestSuiteResults};

    fn verify(met: &[bool]) -> VerifyResult {
        VerifyResult {
            test_suite: TestSuiteResults {
                total: 10,
                passed: 10,
                failed: 0,
                exit_code: 0,
                coverage: None,
            },
            requirements: met
                .iter()
                .enumerate()
                .map(|(i, met)| RequirementVerification {
                    id: format!("req-{}", i + 1),
                    description: format!("Requirement {}", i + 1),
                    met: *met,
                    evidence: "tests".into(),
                })
                .collect(),
            git_clean: true,
        }
    }

    #[test]
    fn test_no_requirements() {
        let report = audit_compliance(&verify(&[]), &[]);
        assert_eq!(report.percentage, 0);
        assert_eq!(report.summary, "No requirements defined");
        assert!(!report.is_complete());
    }

    #[test]
    fn test_all_met() {
        let report = audit_compliance(&verify(&[true, true]), &["task-001".into()]);
        assert_eq!(report.percentage, 100);
        assert!(report.is_complete());
        assert!(report.recommendations.is_empty());
        assert_eq!(report.completed_tasks_count, 1);
        assert_eq!(
            report.summary,
            "Specification complete: 2/2 requirements met (100%)"
        );
    }

    #[test]
    fn test_partial_rounds() {
        let report = audit_compliance(&verify(&[true, true, false]), &[]);
        assert_eq!(report.percentage, 67);
        assert_eq!(
            report.summary,
            "Specification 67% complete: 2/3 requirements met"
        );
        assert_eq!(
            report.recommendations,
            vec!["Address unmet requirement: req-3 - Requirement 3"]
        );
    }

    #[test]
    fn test_failing_tests_and_dirty_tree_recommended() {
        let mut v = verify(&[true]);
        v.test_suite.failed = 2;
        v.git_clean = false;
        let report = audit_compliance(&v, &[]);
        assert!(report.recommendations.contains(&"Fix 2 failing test(s)".to_string()));
        assert!(
            report
                .recommendations
                .contains(&"Commit or discard uncommitted changes".to_string())
        );
    }
}
