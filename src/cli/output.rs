use anyhow::Result;
use colored::*;
use std::fmt::Write as _;

use crate::analyzers::traits::Severity;
use crate::analyzers::version::ResolvedVersion;
use crate::core::pipeline::FinalResult;
use crate::fixers::VerificationStatus;

pub struct OutputFormatter {
    format: String,
}

impl OutputFormatter {
    pub fn new(format: &str) -> Self {
        Self {
            format: format.to_string(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    pub fn display(&self, result: &FinalResult) -> Result<()> {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(result)?);
        } else {
            print!("{}", render_table(result));
        }
        Ok(())
    }

    pub fn display_version(&self, resolved: &ResolvedVersion) -> Result<()> {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(resolved)?);
        } else {
            println!(
                "  Biome:  {}{}",
                resolved.variant.to_string().green(),
                resolved
                    .version
                    .map(|v| format!(" ({v})"))
                    .unwrap_or_default()
            );
            println!("  Source: {}", resolved.source.to_string().cyan());
        }
        Ok(())
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warning => "WARN".yellow().bold(),
        Severity::Info => "INFO".bright_black().bold(),
    }
}

pub fn render_table(result: &FinalResult) -> String {
    let report = &result.report;
    let mut out = String::new();
    let rule = "─".repeat(64);

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", format!("editguard v{}", env!("CARGO_PKG_VERSION")).bold());
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "  File:     {}", report.file.display().to_string().cyan());
    let _ = writeln!(
        out,
        "  Checked in {}ms{}",
        report.timing.total_ms,
        if report.cached { " (cached)" } else { "" }
    );
    let _ = writeln!(out);

    for analysis in &report.results {
        let status = match &analysis.failure {
            Some(failure) => format!("failed: {failure}").red(),
            None => analysis.status.to_string().normal(),
        };
        let _ = writeln!(
            out,
            "  {:<12} {:<8} {}",
            analysis.analyzer,
            format!("{}ms", analysis.duration_ms),
            status
        );
    }

    let issues: Vec<_> = report.issues().collect();
    if !issues.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        for issue in issues {
            let _ = writeln!(
                out,
                "  {:<5} {}:{}  {}",
                severity_label(issue.severity),
                issue.line,
                issue.column,
                issue.message.lines().next().unwrap_or_default()
            );
            let mut details = Vec::new();
            details.push(issue.analyzer.clone());
            if let Some(rule) = &issue.rule {
                details.push(rule.clone());
            }
            if issue.fixable {
                details.push("fixable".to_string());
            }
            let _ = writeln!(out, "        {}", details.join(" · ").dimmed());
        }
    }

    if let Some(fix) = &result.fix {
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let headline = if fix.success {
            format!("FIXES: {} applied", fix.fixed_count).green().bold()
        } else if fix.is_partial() {
            format!("FIXES: partial, {} applied", fix.fixed_count).yellow().bold()
        } else {
            "FIXES: failed".red().bold()
        };
        let _ = writeln!(out, "  {headline}");
        for step in &fix.steps {
            let marker = if !step.success {
                "FAIL".red()
            } else if step.changed {
                "DONE".green()
            } else {
                "NOOP".dimmed()
            };
            let _ = writeln!(
                out,
                "    {} {:<10} {}{}",
                marker,
                step.priority.label(),
                step.analyzer,
                if step.sequential { " (sequential)" } else { "" }
            );
        }
        if !fix.conflicts.is_empty() {
            let _ = writeln!(out, "    {} conflict(s), {} deferred", fix.conflicts.len(), fix.deferred);
        }
        if let Some(error) = &fix.error {
            let _ = writeln!(out, "    {}", error.red());
        }
    }

    if let Some(verification) = &result.verification {
        let status = match verification.status {
            VerificationStatus::Verified => "verified".green(),
            VerificationStatus::Regressed => "regressed".red(),
            VerificationStatus::Inconclusive => "inconclusive".yellow(),
        };
        let _ = writeln!(
            out,
            "  VERIFY: {}  resolved {}, persisted {}, new {}",
            status, verification.resolved, verification.persisted, verification.regressed
        );
        if let Some(message) = &verification.message {
            let _ = writeln!(out, "    {}", message.dimmed());
        }
    }
    if result.rolled_back {
        let _ = writeln!(out, "  {}", "Fixes rolled back after regression".yellow());
    }

    let summary = &report.summary;
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "  SUMMARY");
    let _ = writeln!(
        out,
        "    {} issues found ({} errors, {} warnings, {} info)",
        summary.total, summary.errors, summary.warnings, summary.infos
    );
    if summary.fixable > 0 {
        let _ = writeln!(out, "    {} auto-fixable", summary.fixable);
    }
    let _ = writeln!(out);
    out
}
