//! Review gates.
//!
//! Each gate is an independent reviewer that returns a
//! [`ReviewResult`](crate::schemas::ReviewResult). The aggregator folds the
//! per-gate verdicts into one [`AggregatedReviewResult`] that downstream
//! phases (the fix loop in particular) key off.
//!
//! ## Example
//!
//! ```
//! use wrangler_workflow::review::aggregate_gate_results;
//! use wrangler_workflow::schemas::{Assessment, ReviewIssue, ReviewResult, Severity};
//!
//! let security = ReviewResult::needs_revision(vec![ReviewIssue::new(
//!     Severity::Critical,
//!     "Token logged in plain text",
//!     "Redact the token before logging",
//! )]);
//! let style = ReviewResult::approved();
//!
//! let aggregated = aggregate_gate_results(&[
//!     ("security".to_string(), security),
//!     ("style".to_string(), style),
//! ]);
//!
//! assert!(aggregated.has_actionable_issues());
//! assert_eq!(aggregated.assessment(), Assessment::NeedsRevision);
//! assert_eq!(aggregated.gate_results().len(), 2);
//! ```

pub mod gates;

pub use gates::{AggregatedReviewResult, GateSummary, aggregate_gate_results};
