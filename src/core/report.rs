use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyzers::traits::{duration_ms, AnalysisResult, Issue, Severity};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub fixable: usize,
    pub fixed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub total_ms: u64,
    pub analyzers_ms: u64,
    /// Sum of analyzer durations over wall time. Diagnostic only.
    pub parallel_efficiency: f64,
}

/// Merged outcome of every enabled analyzer for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub file: PathBuf,
    pub success: bool,
    pub results: Vec<AnalysisResult>,
    pub summary: Summary,
    pub timing: Timing,
    pub cached: bool,
}

impl AggregatedReport {
    pub fn empty(file: &Path) -> Self {
        Self::aggregate(file, Vec::new(), Duration::ZERO)
    }

    pub fn aggregate(file: &Path, mut results: Vec<AnalysisResult>, elapsed: Duration) -> Self {
        results.sort_by(|a, b| a.analyzer.cmp(&b.analyzer));

        let mut summary = Summary::default();
        for issue in results.iter().flat_map(|r| &r.issues) {
            summary.total += 1;
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
            if issue.fixable {
                summary.fixable += 1;
            }
            if issue.fixed {
                summary.fixed += 1;
            }
        }

        let failed = results.iter().filter(|r| r.is_failure()).count();
        let analyzers_ms: u64 = results.iter().map(|r| r.duration_ms).sum();
        let total_ms = duration_ms(elapsed);
        let parallel_efficiency = if elapsed.is_zero() {
            1.0
        } else {
            Duration::from_millis(analyzers_ms).as_secs_f64() / elapsed.as_secs_f64()
        };

        Self {
            file: file.to_path_buf(),
            success: failed == 0 && summary.errors == 0,
            results,
            summary,
            timing: Timing {
                total_ms,
                analyzers_ms,
                parallel_efficiency,
            },
            cached: false,
        }
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.results.iter().flat_map(|r| r.issues.iter())
    }

    pub fn failed_analyzers(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    /// Issues an analyzer could still fix.
    pub fn pending_fixes(&self) -> impl Iterator<Item = &Issue> {
        self.issues().filter(|i| i.fixable && !i.fixed)
    }
}
