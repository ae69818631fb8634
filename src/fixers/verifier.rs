use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::analyzers::traits::Issue;
use crate::core::orchestrator::ValidationOrchestrator;
use crate::core::report::AggregatedReport;

const VERIFIER_TARGET: &str = "editguard::fixers::verify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Re-validation ran and nothing new appeared.
    Verified,
    /// Re-validation ran and found issues that were not there before.
    Regressed,
    /// Re-validation could not be completed; nothing is known.
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub before: usize,
    pub after: usize,
    pub resolved: usize,
    pub persisted: usize,
    pub regressed: usize,
    /// How many of the originally fixable issues are gone.
    pub intended_resolved: usize,
    pub intended_total: usize,
    pub message: Option<String>,
    pub report: Option<AggregatedReport>,
}

impl VerificationResult {
    fn inconclusive(original: &AggregatedReport, message: String) -> Self {
        Self {
            status: VerificationStatus::Inconclusive,
            before: original.summary.total,
            after: 0,
            resolved: 0,
            persisted: 0,
            regressed: 0,
            intended_resolved: 0,
            intended_total: original.pending_fixes().count(),
            message: Some(message),
            report: None,
        }
    }

    #[allow(dead_code)]
    pub fn all_intended_resolved(&self) -> bool {
        self.status != VerificationStatus::Inconclusive
            && self.intended_resolved == self.intended_total
    }
}

type IssueKey = (String, Option<String>, String);

fn tally<'a>(issues: impl Iterator<Item = &'a Issue>) -> HashMap<IssueKey, usize> {
    let mut counts = HashMap::new();
    for issue in issues {
        *counts.entry(issue.fingerprint()).or_insert(0) += 1;
    }
    counts
}

/// Re-runs validation on fixed content and compares against the report the
/// fixes were planned from. Issues are matched by analyzer, rule and message
/// rather than position, since fixes move lines around.
pub struct FixVerifier<'a> {
    orchestrator: &'a ValidationOrchestrator,
}

impl<'a> FixVerifier<'a> {
    pub fn new(orchestrator: &'a ValidationOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn verify(
        &self,
        file: &Path,
        original: &AggregatedReport,
        fixed_content: &str,
    ) -> VerificationResult {
        match tokio::fs::read_to_string(file).await {
            Ok(on_disk) if on_disk == fixed_content => {}
            Ok(_) => {
                return VerificationResult::inconclusive(
                    original,
                    "file changed after fixes were applied".to_string(),
                )
            }
            Err(err) => {
                return VerificationResult::inconclusive(
                    original,
                    format!("cannot read fixed file: {err}"),
                )
            }
        }

        let after = self.orchestrator.validate(file).await;

        let failed: Vec<String> = after
            .failed_analyzers()
            .map(|r| {
                format!(
                    "{}: {}",
                    r.analyzer,
                    r.failure.as_deref().unwrap_or("failed")
                )
            })
            .collect();
        if !failed.is_empty() {
            let mut result = VerificationResult::inconclusive(
                original,
                format!("re-validation failed ({})", failed.join("; ")),
            );
            result.report = Some(after);
            return result;
        }

        let before_counts = tally(original.issues());
        let after_counts = tally(after.issues());
        let intended_counts = tally(original.pending_fixes());

        let mut resolved = 0;
        let mut persisted = 0;
        let mut regressed = 0;
        for (key, &before) in &before_counts {
            let now = after_counts.get(key).copied().unwrap_or(0);
            resolved += before.saturating_sub(now);
            persisted += before.min(now);
        }
        for (key, &now) in &after_counts {
            let before = before_counts.get(key).copied().unwrap_or(0);
            regressed += now.saturating_sub(before);
        }
        let intended_resolved = intended_counts
            .iter()
            .map(|(key, &wanted)| {
                let before = before_counts.get(key).copied().unwrap_or(0);
                let now = after_counts.get(key).copied().unwrap_or(0);
                wanted.min(before.saturating_sub(now))
            })
            .sum();

        let status = if regressed > 0 {
            warn!(
                target: VERIFIER_TARGET,
                file = %file.display(),
                regressed,
                "fixes introduced new issues"
            );
            VerificationStatus::Regressed
        } else {
            VerificationStatus::Verified
        };

        VerificationResult {
            status,
            before: original.summary.total,
            after: after.summary.total,
            resolved,
            persisted,
            regressed,
            intended_resolved,
            intended_total: intended_counts.values().sum(),
            message: None,
            report: Some(after),
        }
    }
}
