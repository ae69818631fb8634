use serde::{Deserialize, Serialize};

use crate::analyzers::traits::Issue;
use crate::core::report::AggregatedReport;

/// Fix ordering buckets, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityClass {
    Formatting,
    Imports,
    SafeLint,
    Other,
}

impl PriorityClass {
    /// Application order.
    pub const ORDER: [PriorityClass; 4] = [
        PriorityClass::Formatting,
        PriorityClass::Imports,
        PriorityClass::SafeLint,
        PriorityClass::Other,
    ];

    /// Lower rank is applied earlier and wins conflicts.
    pub fn rank(self) -> u8 {
        match self {
            PriorityClass::Formatting => 0,
            PriorityClass::Imports => 1,
            PriorityClass::SafeLint => 2,
            PriorityClass::Other => 3,
        }
    }

    pub fn outranks(self, other: PriorityClass) -> bool {
        self.rank() < other.rank()
    }

    pub fn label(self) -> &'static str {
        match self {
            PriorityClass::Formatting => "formatting",
            PriorityClass::Imports => "imports",
            PriorityClass::SafeLint => "lint-safe",
            PriorityClass::Other => "other",
        }
    }

    /// Buckets an issue by its rule id, falling back to its message.
    pub fn classify(issue: &Issue) -> Self {
        let rule = issue.rule.as_deref().unwrap_or_default().to_ascii_lowercase();
        let message = issue.message.to_ascii_lowercase();

        if rule == "format"
            || rule.starts_with("format/")
            || message.contains("format")
            || message.contains("indentation")
        {
            PriorityClass::Formatting
        } else if rule.contains("import") || message.contains("import") {
            PriorityClass::Imports
        } else if rule.starts_with("lint/") || message.contains("lint") {
            PriorityClass::SafeLint
        } else {
            PriorityClass::Other
        }
    }
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Inclusive range of 1-based lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Touching ranges such as `[1,5]` and `[6,8]` do not overlap.
    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn union(&self, other: &LineRange) -> LineRange {
        LineRange::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixCandidate {
    pub id: String,
    pub issue: Issue,
    pub priority: PriorityClass,
    pub range: LineRange,
    pub group: String,
}

impl FixCandidate {
    pub fn from_issue(index: usize, issue: &Issue) -> Self {
        let priority = PriorityClass::classify(issue);
        let range = LineRange::new(issue.line, issue.end_line.unwrap_or(issue.line));
        Self {
            id: format!("{}-{}-L{}", issue.analyzer, index, issue.line),
            issue: issue.clone(),
            priority,
            range,
            group: priority.label().to_string(),
        }
    }

    pub fn analyzer(&self) -> &str {
        &self.issue.analyzer
    }

    pub fn conflicts_with(&self, other: &FixCandidate) -> bool {
        self.issue.file == other.issue.file && self.range.overlaps(&other.range)
    }
}

/// Every pending fix in the report, in report order.
pub fn build_candidates(report: &AggregatedReport) -> Vec<FixCandidate> {
    report
        .pending_fixes()
        .enumerate()
        .map(|(index, issue)| FixCandidate::from_issue(index, issue))
        .collect()
}
