use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

use crate::analyzers::error::AnalyzerFailure;
use crate::analyzers::traits::{Analyzer, AnalyzerOptions, FixOutput, Issue, Severity};
use crate::utils::process::{self, Invocation};

const BIOME_TARGET: &str = "editguard::analyzers::biome";

/// Supported Biome major versions. The two differ in their fix flags and in
/// whether colour output must be disabled explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BiomeVariant {
    V1,
    V2,
}

impl BiomeVariant {
    pub const NEWEST: BiomeVariant = BiomeVariant::V2;

    /// Selects the variant for a major version. `0.x` predates the JSON
    /// reporter and is not supported; anything newer than the newest known
    /// major is treated as the newest.
    pub fn from_major(major: u64) -> Option<Self> {
        match major {
            0 => None,
            1 => Some(BiomeVariant::V1),
            _ => Some(BiomeVariant::V2),
        }
    }

    pub fn major(&self) -> u64 {
        match self {
            BiomeVariant::V1 => 1,
            BiomeVariant::V2 => 2,
        }
    }

    pub fn fix_flags(&self, unsafe_fixes: bool) -> &'static [&'static str] {
        match (self, unsafe_fixes) {
            (BiomeVariant::V1, false) => &["--apply"],
            (BiomeVariant::V1, true) => &["--apply-unsafe"],
            (BiomeVariant::V2, false) => &["--write"],
            (BiomeVariant::V2, true) => &["--write", "--unsafe"],
        }
    }

    pub fn build_invocation(
        &self,
        binary: &str,
        file: &Path,
        options: &AnalyzerOptions,
    ) -> Invocation {
        let mut invocation = Invocation::new(binary)
            .arg("check")
            .arg(file.to_string_lossy());
        if options.auto_fix {
            invocation = invocation.args(self.fix_flags(options.unsafe_fixes).iter().copied());
        }
        invocation = invocation.arg("--reporter=json");
        if *self == BiomeVariant::V1 {
            invocation = invocation.arg("--no-colors");
        }
        if let Some(config_path) = &options.config_path {
            invocation = invocation
                .arg("--config-path")
                .arg(config_path.to_string_lossy());
        }
        invocation
    }

    /// Converts reporter output into issues. Malformed output yields an empty
    /// list; analysis never blocks on a reporter it cannot read.
    pub fn parse_output(&self, raw: &str, file: &Path) -> Vec<Issue> {
        match parse_report(raw, file) {
            Some(issues) => issues,
            None => {
                warn!(
                    target: BIOME_TARGET,
                    variant = ?self,
                    bytes = raw.len(),
                    "could not parse biome reporter output"
                );
                Vec::new()
            }
        }
    }
}

impl std::fmt::Display for BiomeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "biome v{}", self.major())
    }
}

/// Returns `None` when `raw` does not contain a reporter document with a
/// `diagnostics` array. Log lines before the report may contain braces of
/// their own, so every `{` is tried as a document start.
fn parse_report(raw: &str, file: &Path) -> Option<Vec<Issue>> {
    raw.match_indices('{').find_map(|(start, _)| {
        let document: Value = serde_json::Deserializer::from_str(&raw[start..])
            .into_iter::<Value>()
            .next()?
            .ok()?;
        let diagnostics = document.get("diagnostics")?.as_array()?;
        Some(
            diagnostics
                .iter()
                .map(|diagnostic| diagnostic_to_issue(diagnostic, file))
                .collect(),
        )
    })
}

fn diagnostic_to_issue(diagnostic: &Value, file: &Path) -> Issue {
    let severity = diagnostic
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::parse)
        .unwrap_or(Severity::Error);

    let location = diagnostic.get("location");
    let position = |edge: &str, field: &str| {
        location
            .and_then(|l| l.get(edge))
            .and_then(|p| p.get(field))
            .and_then(Value::as_u64)
    };

    let tags: Vec<&str> = diagnostic
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let fixed = diagnostic
        .get("fixed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let fixable = fixed || tags.contains(&"fixable");

    let rule = diagnostic
        .get("category")
        .and_then(Value::as_str)
        .map(str::to_string);

    Issue::new("biome", file, severity, diagnostic_message(diagnostic))
        .at(position("start", "line"), position("start", "column"))
        .ending_at(position("end", "line"))
        .with_rule(rule)
        .fixable(fixable, fixed)
}

fn diagnostic_message(diagnostic: &Value) -> String {
    if let Some(description) = diagnostic.get("description").and_then(Value::as_str) {
        return description.to_string();
    }
    match diagnostic.get("message") {
        Some(Value::String(text)) => text.clone(),
        // Rich markup form: a list of `{ "content": ... }` fragments.
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("content").and_then(Value::as_str))
            .collect::<String>(),
        _ => String::from("(no message)"),
    }
}

pub struct BiomeAnalyzer {
    variant: BiomeVariant,
    binary: String,
}

impl BiomeAnalyzer {
    pub fn new(variant: BiomeVariant, binary: impl Into<String>) -> Self {
        Self {
            variant,
            binary: binary.into(),
        }
    }

    async fn invoke(
        &self,
        file: &Path,
        options: &AnalyzerOptions,
    ) -> Result<Vec<Issue>, AnalyzerFailure> {
        let invocation = self.variant.build_invocation(&self.binary, file, options);
        let output = process::run(&invocation).await?;

        // Biome exits non-zero whenever it reports errors, so a readable
        // report wins over the exit status.
        if let Some(issues) = parse_report(&output.stdout, file) {
            return Ok(issues);
        }
        if !output.success() {
            return Err(output.into_failure(&self.binary));
        }
        Ok(self.variant.parse_output(&output.stdout, file))
    }
}

#[async_trait]
impl Analyzer for BiomeAnalyzer {
    fn name(&self) -> &str {
        "biome"
    }

    fn supports_fix(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        file: &Path,
        options: &AnalyzerOptions,
    ) -> Result<Vec<Issue>, AnalyzerFailure> {
        self.invoke(file, &options.for_check()).await
    }

    async fn fix(
        &self,
        file: &Path,
        options: &AnalyzerOptions,
    ) -> Result<FixOutput, AnalyzerFailure> {
        let issues = self.invoke(file, &options.for_fix()).await?;
        let (fixed, remaining): (Vec<_>, Vec<_>) = issues.into_iter().partition(|i| i.fixed);
        Ok(FixOutput {
            fixed: fixed.len(),
            remaining,
        })
    }
}
