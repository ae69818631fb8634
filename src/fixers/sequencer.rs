use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyzers::error::AnalyzerFailure;
use crate::analyzers::traits::{duration_ms, Analyzer, AnalyzerOptions, FixOutput};
use crate::core::report::AggregatedReport;
use crate::fixers::candidate::{build_candidates, FixCandidate, PriorityClass};
use crate::fixers::conflict::{Conflict, FixGroup, FixPlan};
use crate::utils::fs::write_atomic;

const FIXERS_TARGET: &str = "editguard::fixers";

/// One fix-mode invocation and what it did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub pass: usize,
    pub priority: PriorityClass,
    pub analyzer: String,
    pub sequential: bool,
    pub candidates: usize,
    pub changed: bool,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixApplicationResult {
    pub success: bool,
    pub fixed_count: usize,
    /// Content of the file after the sequence; the last good snapshot when a
    /// step failed. Whether that snapshot is also back on disk is
    /// `rolled_back`. `None` when the file could not be read at all.
    pub content: Option<String>,
    pub error: Option<String>,
    pub steps: Vec<StepOutcome>,
    pub conflicts: Vec<Conflict>,
    pub deferred: usize,
    pub rolled_back: bool,
}

impl FixApplicationResult {
    fn unchanged(content: &str) -> Self {
        Self {
            success: true,
            fixed_count: 0,
            content: Some(content.to_string()),
            error: None,
            steps: Vec::new(),
            conflicts: Vec::new(),
            deferred: 0,
            rolled_back: false,
        }
    }

    /// The file could not even be read, so nothing was attempted.
    pub fn aborted(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            content: None,
            ..Self::unchanged("")
        }
    }

    /// Some steps landed before a later one failed.
    pub fn is_partial(&self) -> bool {
        !self.success && self.steps.iter().any(|s| s.success && s.changed)
    }
}

/// A unit of work inside a group: one analyzer invocation.
struct Step<'a> {
    analyzer: &'a str,
    candidates: Vec<&'a FixCandidate>,
    sequential: bool,
}

/// Applies fixable findings to one file, one step at a time.
///
/// Steps run strictly in sequence: each fix can shift line numbers, so the
/// file is re-read after every step and the next step starts from that
/// content. Before each step the current content is kept as the rollback
/// snapshot; a failing step restores it and ends the sequence.
pub struct FixSequencer<'a> {
    file: PathBuf,
    analyzers: &'a [Arc<dyn Analyzer>],
    options: AnalyzerOptions,
    timeout: Duration,
}

impl<'a> FixSequencer<'a> {
    pub fn new(
        file: &Path,
        analyzers: &'a [Arc<dyn Analyzer>],
        options: &AnalyzerOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            file: file.to_path_buf(),
            analyzers,
            options: options.for_fix(),
            timeout,
        }
    }

    pub async fn apply(&self, report: &AggregatedReport, original: &str) -> FixApplicationResult {
        let candidates = build_candidates(report);
        if candidates.is_empty() {
            return FixApplicationResult::unchanged(original);
        }

        let plan = FixPlan::build(candidates);
        let mut result = FixApplicationResult::unchanged(original);
        result.conflicts = plan.conflicts().cloned().collect();
        result.deferred = plan
            .passes
            .iter()
            .skip(1)
            .flat_map(|p| &p.groups)
            .map(|g| g.len())
            .sum();

        let mut current = original.to_string();

        for (pass_index, group) in plan.schedule() {
            for step in steps_for(group) {
                let snapshot = current.clone();
                let mut outcome = StepOutcome {
                    pass: pass_index,
                    priority: group.priority,
                    analyzer: step.analyzer.to_string(),
                    sequential: step.sequential,
                    candidates: step.candidates.len(),
                    changed: false,
                    success: false,
                    error: None,
                };

                match self.run_step(&step).await {
                    Ok((fix_output, after)) => {
                        outcome.changed = after != snapshot;
                        outcome.success = true;
                        if outcome.changed {
                            result.fixed_count += fix_output.fixed.max(step.candidates.len());
                        }
                        debug!(
                            target: FIXERS_TARGET,
                            group = group.label(),
                            analyzer = step.analyzer,
                            changed = outcome.changed,
                            "fix step applied"
                        );
                        current = after;
                        result.steps.push(outcome);
                    }
                    Err(failure) => {
                        let message = failure.to_string();
                        warn!(
                            target: FIXERS_TARGET,
                            group = group.label(),
                            analyzer = step.analyzer,
                            error = %message,
                            "fix step failed, restoring last good content"
                        );
                        outcome.error = Some(message.clone());
                        result.steps.push(outcome);
                        let (restored, error) = self.restore(&snapshot, message);
                        result.error = Some(error);
                        result.success = false;
                        result.rolled_back = restored;
                        result.content = Some(snapshot);
                        return result;
                    }
                }
            }
        }

        info!(
            target: FIXERS_TARGET,
            file = %self.file.display(),
            fixed = result.fixed_count,
            steps = result.steps.len(),
            "fix sequence complete"
        );
        result.content = Some(current);
        result
    }

    /// Runs one invocation and reads back what it left on disk.
    async fn run_step(&self, step: &Step<'_>) -> Result<(FixOutput, String), AnalyzerFailure> {
        let analyzer = self
            .analyzers
            .iter()
            .find(|a| a.name() == step.analyzer && a.supports_fix())
            .ok_or_else(|| AnalyzerFailure::FixUnsupported {
                analyzer: step.analyzer.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, analyzer.fix(&self.file, &self.options)).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(AnalyzerFailure::Timeout {
                    analyzer: step.analyzer.to_string(),
                    timeout_ms: duration_ms(self.timeout),
                })
            }
        };

        let after = tokio::fs::read_to_string(&self.file)
            .await
            .map_err(|err| AnalyzerFailure::io(&self.file, err))?;
        Ok((output, after))
    }

    /// Puts `snapshot` back on disk. Returns whether that worked and the
    /// error text to report.
    fn restore(&self, snapshot: &str, error: String) -> (bool, String) {
        match write_atomic(&self.file, snapshot) {
            Ok(()) => (true, error),
            Err(restore_err) => {
                warn!(
                    target: FIXERS_TARGET,
                    file = %self.file.display(),
                    error = %restore_err,
                    "could not restore snapshot"
                );
                (false, format!("{error}; restore failed: {restore_err}"))
            }
        }
    }
}

/// Batched candidates share one invocation per owning analyzer; every
/// sequential candidate gets its own.
fn steps_for(group: &FixGroup) -> Vec<Step<'_>> {
    let mut steps: Vec<Step<'_>> = Vec::new();
    for candidate in &group.batched {
        match steps.iter_mut().find(|s| s.analyzer == candidate.analyzer()) {
            Some(step) => step.candidates.push(candidate),
            None => steps.push(Step {
                analyzer: candidate.analyzer(),
                candidates: vec![candidate],
                sequential: false,
            }),
        }
    }
    for candidate in &group.sequential {
        steps.push(Step {
            analyzer: candidate.analyzer(),
            candidates: vec![candidate],
            sequential: true,
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::mock::{fixable_issue, CallLog, FixStep, MockAnalyzer};
    use crate::analyzers::traits::{AnalysisResult, Issue};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn report(issues: Vec<Issue>) -> AggregatedReport {
        AggregatedReport::aggregate(
            Path::new("a.ts"),
            vec![AnalysisResult::from_issues("biome", issues, Duration::ZERO)],
            Duration::ZERO,
        )
    }

    fn fixture(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.ts");
        fs::write(&file, content).unwrap();
        (tmp, file)
    }

    /// Appends one marker line per invocation so ordering is visible in the
    /// file itself.
    fn marking_biome(log: CallLog) -> Arc<dyn Analyzer> {
        let counter = Arc::new(Mutex::new(0usize));
        Arc::new(
            MockAnalyzer::new("biome")
                .with_log(log)
                .with_fix(move |content| {
                    let mut n = counter.lock().unwrap();
                    *n += 1;
                    FixStep::Write(format!("{content}// step {n}\n"))
                }),
        )
    }

    #[tokio::test]
    async fn test_groups_applied_in_priority_order() {
        let (_tmp, file) = fixture("start\n");
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let analyzers = vec![marking_biome(log.clone())];
        let report = report(vec![
            fixable_issue("biome", "suppressions/unused", "other", 40, 40),
            fixable_issue("biome", "lint/style/useConst", "lint", 30, 30),
            fixable_issue("biome", "assist/source/organizeImports", "imports", 1, 2),
            fixable_issue("biome", "format", "format", 10, 12),
        ]);

        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "start\n").await;

        assert!(result.success);
        let order: Vec<_> = result.steps.iter().map(|s| s.priority).collect();
        assert_eq!(order, PriorityClass::ORDER.to_vec());
        assert_eq!(log.lock().unwrap().len(), 4);
        assert_eq!(result.fixed_count, 4);
        assert_eq!(
            result.content.as_deref(),
            Some("start\n// step 1\n// step 2\n// step 3\n// step 4\n")
        );
        assert_eq!(Some(fs::read_to_string(&file).unwrap()), result.content);
    }

    #[tokio::test]
    async fn test_deferred_imports_fix_runs_before_lint() {
        let (_tmp, file) = fixture("start\n");
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let analyzers = vec![marking_biome(log.clone())];
        let report = report(vec![
            fixable_issue("biome", "format", "format", 1, 10),
            fixable_issue("biome", "assist/source/organizeImports", "imports", 5, 5),
            fixable_issue("biome", "lint/style/useConst", "lint", 20, 20),
        ]);

        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "start\n").await;

        assert!(result.success);
        assert_eq!(result.deferred, 1);
        let order: Vec<_> = result.steps.iter().map(|s| (s.priority, s.pass)).collect();
        assert_eq!(
            order,
            vec![
                (PriorityClass::Formatting, 0),
                (PriorityClass::Imports, 1),
                (PriorityClass::SafeLint, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_one_invocation_per_group() {
        let (_tmp, file) = fixture("x\n");
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let analyzers = vec![marking_biome(log.clone())];
        let report = report(vec![
            fixable_issue("biome", "lint/style/useConst", "a", 1, 1),
            fixable_issue("biome", "lint/style/noVar", "b", 5, 5),
            fixable_issue("biome", "lint/style/useTemplate", "c", 9, 9),
        ]);
        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "x\n").await;
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].candidates, 3);
        assert_eq!(log.lock().unwrap().as_slice(), ["fix:biome"]);
    }

    #[tokio::test]
    async fn test_tied_overlap_runs_sequentially_beside_batch() {
        let (_tmp, file) = fixture("x\n");
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let analyzers = vec![marking_biome(log.clone())];
        let report = report(vec![
            fixable_issue("biome", "lint/style/useConst", "a", 5, 7),
            fixable_issue("biome", "lint/style/noVar", "b", 6, 8),
            fixable_issue("biome", "lint/style/useTemplate", "c", 20, 22),
        ]);
        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "x\n").await;

        assert!(result.success);
        assert_eq!(result.conflicts.len(), 1);
        let shape: Vec<_> = result
            .steps
            .iter()
            .map(|s| (s.sequential, s.candidates))
            .collect();
        assert_eq!(shape, vec![(false, 1), (true, 1), (true, 1)]);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_restores_last_good_snapshot() {
        let (_tmp, file) = fixture("v0\n");
        let calls = Arc::new(Mutex::new(0usize));
        let analyzer: Arc<dyn Analyzer> = Arc::new(MockAnalyzer::new("biome").with_fix(move |content| {
            let mut n = calls.lock().unwrap();
            *n += 1;
            if *n == 1 {
                FixStep::Write(format!("{content}formatted\n"))
            } else {
                FixStep::Fail {
                    written: Some("half-writ".to_string()),
                    error: "internal error".to_string(),
                }
            }
        }));
        let analyzers = vec![analyzer];
        let report = report(vec![
            fixable_issue("biome", "format", "format", 1, 1),
            fixable_issue("biome", "assist/source/organizeImports", "imports", 3, 3),
            fixable_issue("biome", "lint/style/useConst", "lint", 9, 9),
        ]);
        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "v0\n").await;

        assert!(!result.success);
        assert!(result.is_partial());
        assert!(result.rolled_back);
        assert_eq!(result.fixed_count, 1);
        assert!(result.error.as_deref().unwrap().contains("internal error"));
        // The lint group never ran.
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.content.as_deref(), Some("v0\nformatted\n"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "v0\nformatted\n");
    }

    #[tokio::test]
    async fn test_failed_restore_is_not_reported_as_rolled_back() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("work");
        fs::create_dir(&dir).unwrap();
        let file = dir.join("a.ts");
        fs::write(&file, "v0\n").unwrap();

        let doomed = dir.clone();
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![Arc::new(MockAnalyzer::new("biome").with_fix(
            move |_| {
                fs::remove_dir_all(&doomed).unwrap();
                FixStep::Fail {
                    written: None,
                    error: "internal error".to_string(),
                }
            },
        ))];
        let report = report(vec![fixable_issue("biome", "format", "format", 1, 1)]);
        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "v0\n").await;

        assert!(!result.success);
        assert!(!result.rolled_back);
        assert!(result.error.as_deref().unwrap().contains("restore failed"));
    }

    #[test]
    fn test_aborted_result_has_no_content() {
        let result = FixApplicationResult::aborted("cannot read file".to_string());
        assert!(!result.success);
        assert!(result.content.is_none());
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_missing_fixer_stops_sequence_without_touching_file() {
        let (_tmp, file) = fixture("keep\n");
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![Arc::new(MockAnalyzer::new("typescript"))];
        let report = report(vec![fixable_issue("biome", "format", "f", 1, 1)]);
        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, "keep\n").await;
        assert!(!result.success);
        assert!(!result.is_partial());
        assert_eq!(result.content.as_deref(), Some("keep\n"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "keep\n");
    }

    #[tokio::test]
    async fn test_fix_timeout_is_a_failure() {
        let (_tmp, file) = fixture("keep\n");
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![Arc::new(
            MockAnalyzer::new("biome")
                .slow(Duration::from_secs(30))
                .with_fix(|c| FixStep::Write(c.to_string())),
        )];
        let report = report(vec![fixable_issue("biome", "format", "f", 1, 1)]);
        let sequencer = FixSequencer::new(
            &file,
            &analyzers,
            &AnalyzerOptions::default(),
            Duration::from_millis(50),
        );
        let result = sequencer.apply(&report, "keep\n").await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "keep\n");
    }

    #[tokio::test]
    async fn test_nothing_fixable_leaves_content_identical() {
        let original = "const a = 1;\r\n\tweird  spacing\u{00e9}\n";
        let (_tmp, file) = fixture(original);
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let analyzers = vec![marking_biome(log.clone())];
        let report = report(vec![fixable_issue("biome", "format", "f", 1, 1).fixable(false, false)]);
        let sequencer =
            FixSequencer::new(&file, &analyzers, &AnalyzerOptions::default(), Duration::from_secs(1));
        let result = sequencer.apply(&report, original).await;
        assert!(result.success);
        assert!(result.steps.is_empty());
        assert_eq!(result.content.as_deref(), Some(original));
        assert_eq!(fs::read(&file).unwrap(), original.as_bytes());
        assert!(log.lock().unwrap().is_empty());
    }
}
