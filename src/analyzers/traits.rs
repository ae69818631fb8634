use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyzers::error::AnalyzerFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Maps a tool's severity string onto the three known levels.
    /// Anything unrecognised becomes `Error` so it is never silently dropped.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warning" | "warn" => Severity::Warning,
            "info" | "information" | "hint" | "suggestion" | "message" => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub analyzer: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    /// Last line the finding spans, when the tool reports one.
    pub end_line: Option<u32>,
    pub severity: Severity,
    pub message: String,
    /// Tool rule or category, e.g. `lint/correctness/noUnusedImports`.
    pub rule: Option<String>,
    pub fixed: bool,
    pub fixable: bool,
}

impl Issue {
    pub fn new(
        analyzer: impl Into<String>,
        file: impl Into<PathBuf>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            analyzer: analyzer.into(),
            file: file.into(),
            line: 1,
            column: 1,
            end_line: None,
            severity,
            message: message.into(),
            rule: None,
            fixed: false,
            fixable: false,
        }
    }

    /// Sets the position; zero or missing values normalize to 1.
    pub fn at(mut self, line: Option<u64>, column: Option<u64>) -> Self {
        self.line = normalize_position(line);
        self.column = normalize_position(column);
        self
    }

    pub fn ending_at(mut self, end_line: Option<u64>) -> Self {
        self.end_line = end_line.map(|l| normalize_position(Some(l)));
        self
    }

    pub fn with_rule(mut self, rule: Option<String>) -> Self {
        self.rule = rule;
        self
    }

    pub fn fixable(mut self, fixable: bool, fixed: bool) -> Self {
        self.fixable = fixable;
        self.fixed = fixed;
        self
    }

    /// Identity used to match the same finding across two runs, where line
    /// numbers may have shifted.
    pub fn fingerprint(&self) -> (String, Option<String>, String) {
        (self.analyzer.clone(), self.rule.clone(), self.message.clone())
    }
}

fn normalize_position(value: Option<u64>) -> u32 {
    value
        .filter(|v| *v >= 1)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::Success => write!(f, "success"),
            AnalysisStatus::Warning => write!(f, "warning"),
            AnalysisStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one analyzer for one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analyzer: String,
    pub status: AnalysisStatus,
    pub issues: Vec<Issue>,
    pub duration_ms: u64,
    pub failure: Option<String>,
}

impl AnalysisResult {
    pub fn from_issues(analyzer: &str, mut issues: Vec<Issue>, duration: Duration) -> Self {
        issues.sort_by(|a, b| {
            (a.line, a.column)
                .cmp(&(b.line, b.column))
                .then_with(|| a.message.cmp(&b.message))
        });
        // Tools occasionally emit the same diagnostic twice.
        issues.dedup();
        let status = if issues.iter().any(|i| i.severity == Severity::Error) {
            AnalysisStatus::Error
        } else if issues.iter().any(|i| i.severity == Severity::Warning) {
            AnalysisStatus::Warning
        } else {
            AnalysisStatus::Success
        };
        Self {
            analyzer: analyzer.to_string(),
            status,
            issues,
            duration_ms: duration_ms(duration),
            failure: None,
        }
    }

    pub fn failed(analyzer: &str, failure: &AnalyzerFailure, duration: Duration) -> Self {
        Self {
            analyzer: analyzer.to_string(),
            status: AnalysisStatus::Error,
            issues: Vec::new(),
            duration_ms: duration_ms(duration),
            failure: Some(failure.to_string()),
        }
    }

    /// True when the analyzer itself did not run to completion.
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerOptions {
    pub auto_fix: bool,
    pub config_path: Option<PathBuf>,
    pub unsafe_fixes: bool,
}

impl AnalyzerOptions {
    /// The same options with write-mode switched on.
    pub fn for_fix(&self) -> Self {
        Self {
            auto_fix: true,
            ..self.clone()
        }
    }

    pub fn for_check(&self) -> Self {
        Self {
            auto_fix: false,
            ..self.clone()
        }
    }
}

/// What a fix-mode invocation reported back.
#[derive(Debug, Clone, Default)]
pub struct FixOutput {
    /// Findings the tool marked as fixed in this pass.
    pub fixed: usize,
    /// Findings still present after the pass.
    pub remaining: Vec<Issue>,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    fn supports_fix(&self) -> bool;

    /// Reports findings for `file` without modifying it.
    async fn analyze(
        &self,
        file: &Path,
        options: &AnalyzerOptions,
    ) -> Result<Vec<Issue>, AnalyzerFailure>;

    /// Rewrites `file` in place with every fix the tool can apply.
    async fn fix(&self, file: &Path, options: &AnalyzerOptions)
        -> Result<FixOutput, AnalyzerFailure>;
}
