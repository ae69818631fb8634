//! Scripted analyzer for exercising the orchestrator and fix engine without
//! external tools.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::analyzers::error::AnalyzerFailure;
use crate::analyzers::traits::{Analyzer, AnalyzerOptions, FixOutput, Issue, Severity};

type IssuesFn = dyn Fn(&Path, &str) -> Vec<Issue> + Send + Sync;
type FixFn = dyn Fn(&str) -> FixStep + Send + Sync;

pub enum FixStep {
    Write(String),
    Fail {
        written: Option<String>,
        error: String,
    },
}

/// Shared record of analyzer calls, in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct MockAnalyzer {
    name: String,
    issues: Arc<IssuesFn>,
    fix: Option<Arc<FixFn>>,
    failure: Option<AnalyzerFailure>,
    panics: bool,
    delay: Duration,
    log: CallLog,
    analyze_calls: Arc<AtomicUsize>,
}

impl MockAnalyzer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            issues: Arc::new(|_, _| Vec::new()),
            fix: None,
            failure: None,
            panics: false,
            delay: Duration::ZERO,
            log: Arc::new(Mutex::new(Vec::new())),
            analyze_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_issues(self, issues: Vec<Issue>) -> Self {
        self.with_issues_from(move |_, _| issues.clone())
    }

    /// Derives findings from the current file content on every call.
    pub fn with_issues_from<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path, &str) -> Vec<Issue> + Send + Sync + 'static,
    {
        self.issues = Arc::new(f);
        self
    }

    pub fn with_fix<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> FixStep + Send + Sync + 'static,
    {
        self.fix = Some(Arc::new(f));
        self
    }

    pub fn failing(mut self, failure: AnalyzerFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn analyze_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.analyze_calls)
    }
}

/// Convenience constructor for a fixable finding.
pub fn fixable_issue(analyzer: &str, rule: &str, message: &str, line: u64, end_line: u64) -> Issue {
    Issue::new(analyzer, "a.ts", Severity::Error, message)
        .at(Some(line), Some(1))
        .ending_at(Some(end_line))
        .with_rule(Some(rule.to_string()))
        .fixable(true, false)
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_fix(&self) -> bool {
        self.fix.is_some()
    }

    async fn analyze(
        &self,
        file: &Path,
        _options: &AnalyzerOptions,
    ) -> Result<Vec<Issue>, AnalyzerFailure> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("analyze:{}", self.name));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("scripted panic in {}", self.name);
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let content = tokio::fs::read_to_string(file).await.unwrap_or_default();
        Ok((self.issues)(file, &content))
    }

    async fn fix(
        &self,
        file: &Path,
        _options: &AnalyzerOptions,
    ) -> Result<FixOutput, AnalyzerFailure> {
        self.log.lock().unwrap().push(format!("fix:{}", self.name));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let Some(fix) = &self.fix else {
            return Err(AnalyzerFailure::FixUnsupported {
                analyzer: self.name.clone(),
            });
        };
        let content = tokio::fs::read_to_string(file)
            .await
            .map_err(|err| AnalyzerFailure::io(file, err))?;
        match fix(&content) {
            FixStep::Write(updated) => {
                tokio::fs::write(file, &updated)
                    .await
                    .map_err(|err| AnalyzerFailure::io(file, err))?;
                let remaining = (self.issues)(file, &updated);
                Ok(FixOutput {
                    fixed: 0,
                    remaining,
                })
            }
            FixStep::Fail { written, error } => {
                if let Some(partial) = written {
                    tokio::fs::write(file, partial)
                        .await
                        .map_err(|err| AnalyzerFailure::io(file, err))?;
                }
                Err(AnalyzerFailure::NonZeroExit {
                    program: self.name.clone(),
                    status: Some(1),
                    stderr: error,
                })
            }
        }
    }
}
