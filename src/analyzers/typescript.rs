use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::analyzers::error::AnalyzerFailure;
use crate::analyzers::traits::{Analyzer, AnalyzerOptions, FixOutput, Issue, Severity};
use crate::utils::fs::find_upwards;
use crate::utils::process::{self, Invocation};

const TYPESCRIPT_TARGET: &str = "editguard::analyzers::typescript";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl DiagnosticCategory {
    fn severity(self) -> Severity {
        match self {
            DiagnosticCategory::Error => Severity::Error,
            DiagnosticCategory::Warning => Severity::Warning,
            DiagnosticCategory::Suggestion | DiagnosticCategory::Message => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChain {
    pub text: String,
    pub next: Vec<MessageChain>,
}

impl MessageChain {
    pub fn leaf(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            next: Vec::new(),
        }
    }

    fn flatten_into(&self, depth: usize, out: &mut Vec<String>) {
        out.push(format!("{}{}", "  ".repeat(depth), self.text));
        for child in &self.next {
            child.flatten_into(depth + 1, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticMessage {
    Text(String),
    Chain(MessageChain),
}

impl DiagnosticMessage {
    /// Joins a chained message depth-first, one line per link.
    pub fn flatten(&self) -> String {
        match self {
            DiagnosticMessage::Text(text) => text.clone(),
            DiagnosticMessage::Chain(chain) => {
                let mut lines = Vec::new();
                chain.flatten_into(0, &mut lines);
                lines.join("\n")
            }
        }
    }
}

/// A compiler diagnostic in the compiler's own structured form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    pub file: Option<PathBuf>,
    /// 0-based character offset into the file.
    pub start: Option<usize>,
    pub category: DiagnosticCategory,
    pub code: Option<u32>,
    pub message: DiagnosticMessage,
}

/// Where compiler diagnostics come from.
#[async_trait]
pub trait DiagnosticSource: Send + Sync {
    async fn diagnostics(&self, file: &Path) -> Result<Vec<CompilerDiagnostic>, AnalyzerFailure>;
}

/// Converts a 0-based character offset into 1-based line and column.
pub fn offset_to_line_col(content: &str, offset: usize) -> (u64, u64) {
    let mut line = 1;
    let mut column = 1;
    for (index, ch) in content.chars().enumerate() {
        if index == offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Inverse of [`offset_to_line_col`]; positions past the end clamp to it.
pub fn line_col_to_offset(content: &str, line: u64, column: u64) -> usize {
    let mut current_line = 1;
    let mut offset = 0;
    let mut chars = content.chars().peekable();
    while current_line < line {
        match chars.next() {
            Some('\n') => {
                current_line += 1;
                offset += 1;
            }
            Some(_) => offset += 1,
            None => return offset,
        }
    }
    let mut remaining = column.saturating_sub(1);
    while remaining > 0 {
        match chars.peek() {
            Some('\n') | None => break,
            Some(_) => {
                chars.next();
                offset += 1;
                remaining -= 1;
            }
        }
    }
    offset
}

pub struct TypeScriptAnalyzer {
    source: Box<dyn DiagnosticSource>,
}

impl TypeScriptAnalyzer {
    pub fn new(source: Box<dyn DiagnosticSource>) -> Self {
        Self { source }
    }

    pub fn with_tsc(binary: impl Into<String>) -> Self {
        Self::new(Box::new(TscSource::new(binary)))
    }
}

#[async_trait]
impl Analyzer for TypeScriptAnalyzer {
    fn name(&self) -> &str {
        "typescript"
    }

    fn supports_fix(&self) -> bool {
        false
    }

    async fn analyze(
        &self,
        file: &Path,
        _options: &AnalyzerOptions,
    ) -> Result<Vec<Issue>, AnalyzerFailure> {
        let diagnostics = self.source.diagnostics(file).await?;
        let content = tokio::fs::read_to_string(file)
            .await
            .map_err(|err| AnalyzerFailure::io(file, err))?;

        Ok(diagnostics
            .into_iter()
            .filter(|d| d.file.as_deref().map_or(true, |f| same_file(f, file)))
            .map(|d| {
                let (line, column) = match d.start {
                    Some(start) => {
                        let (line, column) = offset_to_line_col(&content, start);
                        (Some(line), Some(column))
                    }
                    None => (None, None),
                };
                Issue::new("typescript", file, d.category.severity(), d.message.flatten())
                    .at(line, column)
                    .with_rule(d.code.map(|code| format!("TS{code}")))
                    .fixable(false, false)
            })
            .collect())
    }

    async fn fix(
        &self,
        _file: &Path,
        _options: &AnalyzerOptions,
    ) -> Result<FixOutput, AnalyzerFailure> {
        Err(AnalyzerFailure::FixUnsupported {
            analyzer: self.name().to_string(),
        })
    }
}

fn same_file(reported: &Path, target: &Path) -> bool {
    if let (Ok(a), Ok(b)) = (reported.canonicalize(), target.canonicalize()) {
        return a == b;
    }
    reported.ends_with(target) || target.ends_with(reported)
}

/// Runs `tsc --noEmit --pretty false` and lifts its records into
/// [`CompilerDiagnostic`]s. Uses the nearest `tsconfig.json` when one exists.
pub struct TscSource {
    binary: String,
}

impl TscSource {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn invocation(&self, file: &Path) -> Invocation {
        let invocation = Invocation::new(&self.binary).args(["--noEmit", "--pretty", "false"]);
        match find_upwards(file, "tsconfig.json") {
            Some(project) => invocation.arg("-p").arg(project.to_string_lossy()),
            None => invocation.arg(file.to_string_lossy()),
        }
    }
}

#[async_trait]
impl DiagnosticSource for TscSource {
    async fn diagnostics(&self, file: &Path) -> Result<Vec<CompilerDiagnostic>, AnalyzerFailure> {
        let content = tokio::fs::read_to_string(file)
            .await
            .map_err(|err| AnalyzerFailure::io(file, err))?;
        let output = process::run(&self.invocation(file)).await?;
        let diagnostics = parse_tsc_output(&output.stdout, file, &content);

        debug!(
            target: TYPESCRIPT_TARGET,
            status = ?output.status,
            diagnostics = diagnostics.len(),
            "tsc finished"
        );

        if !output.success() && diagnostics.is_empty() {
            let stderr = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(AnalyzerFailure::NonZeroExit {
                program: self.binary.clone(),
                status: output.status,
                stderr,
            });
        }
        Ok(diagnostics)
    }
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(.+?)\((\d+),(\d+)\): )?(error|warning|suggestion|message) TS(\d+): (.*)$")
            .expect("tsc record pattern is valid")
    })
}

fn parse_category(raw: &str) -> DiagnosticCategory {
    match raw {
        "warning" => DiagnosticCategory::Warning,
        "suggestion" => DiagnosticCategory::Suggestion,
        "message" => DiagnosticCategory::Message,
        _ => DiagnosticCategory::Error,
    }
}

/// Parses `--pretty false` output. Indented lines following a record are
/// the links of its message chain, two spaces per level.
fn parse_tsc_output(stdout: &str, target: &Path, content: &str) -> Vec<CompilerDiagnostic> {
    let mut diagnostics: Vec<(CompilerDiagnostic, Vec<(usize, String)>)> = Vec::new();

    for line in stdout.lines() {
        if let Some(caps) = record_pattern().captures(line) {
            let file = caps.get(1).map(|m| PathBuf::from(m.as_str()));
            let start = match (caps.get(2), caps.get(3), &file) {
                (Some(l), Some(c), Some(reported)) if same_file(reported, target) => {
                    let line = l.as_str().parse().unwrap_or(1);
                    let column = c.as_str().parse().unwrap_or(1);
                    Some(line_col_to_offset(content, line, column))
                }
                _ => None,
            };
            diagnostics.push((
                CompilerDiagnostic {
                    file,
                    start,
                    category: parse_category(&caps[4]),
                    code: caps[5].parse().ok(),
                    message: DiagnosticMessage::Text(caps[6].to_string()),
                },
                Vec::new(),
            ));
        } else if let Some((_, links)) = diagnostics.last_mut() {
            let trimmed = line.trim_start();
            if !trimmed.is_empty() {
                let indent = line.len() - trimmed.len();
                links.push((indent / 2, trimmed.to_string()));
            }
        }
    }

    diagnostics
        .into_iter()
        .map(|(mut diagnostic, links)| {
            if !links.is_empty() {
                if let DiagnosticMessage::Text(head) = &diagnostic.message {
                    let mut root = MessageChain::leaf(head.clone());
                    let mut index = 0;
                    root.next = build_chain(&links, &mut index, 0);
                    diagnostic.message = DiagnosticMessage::Chain(root);
                }
            }
            diagnostic
        })
        .collect()
}

fn build_chain(links: &[(usize, String)], index: &mut usize, depth: usize) -> Vec<MessageChain> {
    let mut siblings = Vec::new();
    while *index < links.len() {
        let (level, text) = &links[*index];
        if *level < depth {
            break;
        }
        *index += 1;
        let mut node = MessageChain::leaf(text.clone());
        node.next = build_chain(links, index, level + 1);
        siblings.push(node);
    }
    siblings
}
